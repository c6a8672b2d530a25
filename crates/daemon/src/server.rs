// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.

use std::sync::Arc;

use dq_core::Clock;
use dq_queue::{Manager, QueueError, WalAppend};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error};

use crate::protocol::{self, ProtocolError, Request, Response, DEFAULT_TIMEOUT};

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Request timeout")]
    Timeout,
}

/// Accept connections forever, serving each on its own task
pub async fn serve<C, W>(listener: &TcpListener, manager: Arc<Manager<C, W>>)
where
    C: Clock + 'static,
    W: WalAppend + 'static,
{
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(peer = %peer, "accepted connection");
                let manager = Arc::clone(&manager);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(manager, stream).await {
                        error!("error handling connection: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("error accepting connection: {}", e);
            }
        }
    }
}

/// Handle a single client connection
pub async fn handle_connection<C, W>(
    manager: Arc<Manager<C, W>>,
    stream: TcpStream,
) -> Result<(), ServerError>
where
    C: Clock,
    W: WalAppend,
{
    // Split stream for reading/writing
    let (mut reader, mut writer) = stream.into_split();

    // Read request with timeout
    let request = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(req) => req,
        Err(ProtocolError::Timeout) => {
            error!("Request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected before sending request");
            return Ok(());
        }
        Err(e) => {
            error!("Failed to read request: {}", e);
            return Err(ServerError::Protocol(e));
        }
    };

    debug!("Received request: {:?}", request);

    // Handle request
    let response = handle_request(&manager, request);

    debug!("Sending response: {:?}", response);

    // Write response with timeout
    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT)
        .await
        .map_err(ServerError::Protocol)?;

    Ok(())
}

/// Dispatch a single request to the queue manager
fn handle_request<C, W>(manager: &Manager<C, W>, request: Request) -> Response
where
    C: Clock,
    W: WalAppend,
{
    match request {
        Request::Enqueue { task_id, payload } => match manager.enqueue(&task_id, &payload) {
            Ok(()) => Response::Ok,
            Err(e) => error_response(e),
        },

        Request::Poll { worker_id } => match manager.poll(&worker_id) {
            Ok(Some(task)) => Response::Task(Box::new(task)),
            Ok(None) => Response::Empty,
            Err(e) => error_response(e),
        },

        Request::Ack { task_id, worker_id } => match manager.ack(&task_id, &worker_id) {
            Ok(()) => Response::Ok,
            Err(e) => error_response(e),
        },

        Request::Metrics => Response::Metrics(manager.stats()),
    }
}

/// Stable wire identifier for each error kind
fn error_kind(err: &QueueError) -> &'static str {
    match err {
        QueueError::InvalidInput(_) => "invalid_input",
        QueueError::CapacityExceeded => "capacity_exceeded",
        QueueError::NotFound(_) => "not_found",
        QueueError::NotInFlight(_) => "not_in_flight",
        QueueError::WorkerMismatch(_) => "worker_mismatch",
        QueueError::Durability(_) => "durability",
    }
}

fn error_response(err: QueueError) -> Response {
    Response::Error {
        kind: error_kind(&err).to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
