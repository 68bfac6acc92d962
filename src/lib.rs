//! OAuth 2.0 integration gateway: CSRF-safe authorization state, authorization-code
//! exchange, and single-use credential handoff backed by ephemeral key-value stores.
//!
//! A [`Gateway`](flows::Gateway) drives one provider (HubSpot, Airtable, Notion, or any
//! [`ProviderDescriptor`](provider::ProviderDescriptor)) through three calls:
//!
//! 1. [`begin_authorization`](flows::Gateway::begin_authorization) mints and stores state and
//!    returns the consent URL.
//! 2. [`handle_callback`](flows::Gateway::handle_callback) validates the returned state,
//!    exchanges the code, and stores the credentials with a bounded TTL.
//! 3. [`fetch_credentials`](flows::Gateway::fetch_credentials) hands the credentials to the
//!    application once.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod store;

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::RwLock;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
