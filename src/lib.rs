//! Update and sealing engine for asbestos waste tracking documents.
//!
//! Signatures collected along the workflow progressively lock the fields of
//! a document. [`service::BordereauService::update_document`] merges a
//! partial update, refuses it when it touches a locked field, reconciles the
//! transporter chain, persists the result atomically and tells the producer
//! when the CAP of the final facility changed.

pub mod config;
pub mod diff;
pub mod document;
pub mod error;
pub mod notifier;
pub mod patch;
pub mod quantity;
pub mod registry;
pub mod sealing;
pub mod service;
pub mod store;
pub mod transporters;
pub mod utils;
