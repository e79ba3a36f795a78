#![forbid(unsafe_code)]

mod client;
mod connect;
mod error;
mod types;
mod util;

pub use client::{ClientOptions, HttpClient};
pub use error::{Error, Result};
pub use types::{HttpRequest, HttpResponse};
