//! # Yatube Core
//!
//! The domain layer of Yatube: records, pagination, forms and the ports
//! infrastructure has to implement.
//! This crate contains pure business logic with zero infrastructure dependencies.

pub mod domain;
pub mod error;
pub mod forms;
pub mod pagination;
pub mod ports;

pub use error::{DomainError, RepoError};
pub use pagination::{Page, PageWindow, Paginator};
