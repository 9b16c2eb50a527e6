//! Specrec Core Library
//!
//! This library records live API responses as fixtures for the examples of an
//! OpenAPI 3 document, compares a server against those fixtures, and keeps
//! the document tidy.
//!
//! The pipeline shared by every command is: [`endpoints::enumerate`] finds
//! the callable (path, method, status, example) combinations,
//! [`resolver::ParameterResolver`] builds concrete requests from them,
//! [`http::fetch_responses`] sends them under the concurrency ceiling of
//! [`scheduler::run_bounded`], and [`compare`] / [`fixtures`] judge and store
//! what came back.

pub mod compare;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod examples;
pub mod fixtures;
pub mod http;
pub mod openapi;
pub mod resolver;
pub mod scheduler;
pub mod workflows;

pub use crate::{
    compare::{CompareMode, MatchKind},
    config::Config,
    endpoints::{enumerate, EndpointRef, RequestDescriptor},
    error::{Error, Result},
    http::{HttpInvoker, ReqwestInvoker},
    openapi::{SpecDocument, ValidatedSpec},
    resolver::{ParameterResolver, ScriptProvider, ValueProvider, ValueSource},
    workflows::{compare::CompareReport, record::RecordReport},
};
