// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Invalid binding configuration: {0}")]
    Configuration(String),

    #[error("Entity is not bound to this dispatcher: {0}")]
    NotBound(String),

    #[error("Dispatcher is stopped or shutting down")]
    DispatcherStopped,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
