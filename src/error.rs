// MCP3008 - 8-channel 10-bit ADC over SPI
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for the MCP3008 reader
//!
//! Bus faults are recoverable per sweep; initialization faults are fatal
//! to whoever is trying to open the bus.

use thiserror::Error;

/// Result type alias for MCP3008 operations
pub type Result<T> = std::result::Result<T, AdcError>;

/// Main error type for MCP3008 operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdcError {
    /// A transfer on an open bus failed
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// The bus could not be opened or configured
    #[error("Initialization error: {0}")]
    Init(#[from] InitError),

    /// Channel index outside 0..=7
    #[error("Invalid channel: {0} (expected 0-7)")]
    InvalidChannel(u8),
}

/// Errors raised while a transfer is in progress
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BusError {
    /// The underlying driver rejected or aborted the transfer
    #[error("Transfer failed: {reason}")]
    Transfer { reason: String },

    /// Fewer bytes were clocked than the frame requires
    #[error("Short transfer: expected {expected} bytes, got {actual}")]
    ShortTransfer { expected: usize, actual: usize },

    /// The bus handle cannot be used (e.g. a previous holder panicked)
    #[error("Bus unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Errors raised while acquiring the bus at startup
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InitError {
    /// The port string could not be parsed
    #[error("Invalid SPI port {port:?}: {reason}")]
    InvalidPort { port: String, reason: String },

    /// The device could not be opened
    #[error("Failed to open SPI port {port}: {reason}")]
    Open { port: String, reason: String },

    /// The device refused the required clock or mode
    #[error("Failed to configure SPI port {port}: {reason}")]
    Configure { port: String, reason: String },
}
