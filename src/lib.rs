#![forbid(unsafe_code)]

//! Rust client for the WEkEO Harmonized Data Access (HDA) broker.
//!
//! The broker fronts the Copernicus data archives behind a small REST API:
//! you authenticate with your account's API key, submit a JSON query
//! descriptor, wait for the resulting *job*, then place a per-file *order*
//! and stream each ordered file to disk. This crate wraps that flow in a
//! blocking [`Client`] whose stages return explicit values, poll on a bounded
//! fixed interval, and fail with typed errors instead of looping or printing.
//!
//! **Quick start**
//! ```no_run
//! use wekeo_hda::{Client, ClientOptions, Credentials, QueryDescriptor};
//!
//! let opts = ClientOptions {
//!     download_dir: "./downloads".into(),
//!     ..ClientOptions::default()
//! };
//! let creds = Credentials::new("username", "password");
//! let mut client = Client::connect(opts, creds)?;
//!
//! let descriptor = QueryDescriptor::from_file("descriptor.json")?;
//! for report in client.retrieve(&descriptor)? {
//!     println!("{} -> {} bytes", report.path.display(), report.bytes);
//! }
//! # Ok::<(), wekeo_hda::Error>(())
//! ```
//!
//! **Stage by stage**
//! ```no_run
//! use wekeo_hda::{Client, ClientOptions, Credentials, QueryDescriptor};
//!
//! let mut client = Client::new(ClientOptions::default(), Credentials::new("u", "p"))?;
//! client.authenticate()?;
//! client.ensure_terms("Copernicus_General_License")?;
//!
//! let descriptor = QueryDescriptor::new("EO:ECMWF:DAT:ERA5_HOURLY_DATA_ON_SINGLE_LEVELS")
//!     .bbox("bbox", [-11.0, 35.0, 35.0, 58.0])
//!     .select("variable", ["2m_temperature"])
//!     .choice("format", "netcdf");
//!
//! let job = client.submit_request(&descriptor)?;
//! client.wait_for_job(&job)?;
//! for file in client.list_results(&job)? {
//!     let order = client.create_order(&job, &file)?;
//!     client.wait_for_order(&order)?;
//!     client.download_order(&order)?;
//! }
//! # Ok::<(), wekeo_hda::Error>(())
//! ```
//!
//! Notes:
//! - Access requires a (free) WEkEO account; most datasets also require a
//!   one-time licence acceptance, see [`Client::ensure_terms`].
//! - Downloads are strictly sequential; the broker throttles parallel orders
//!   per account anyway.

mod client;
mod config;
mod descriptor;
mod download;
mod error;
mod status;

pub use crate::client::{Client, Job, Order, ProductInfo, ResultFile};
pub use crate::config::{ClientOptions, Credentials, DEFAULT_BROKER_URL};
pub use crate::descriptor::{
    BoundingBoxValue, DateRangeSelect, MultiStringSelect, QueryDescriptor, StringChoice,
};
pub use crate::download::{CHUNK_SIZE, DownloadReport, Progress, Silent, TextProgress, human_bytes};
pub use crate::error::{Error, Result};
pub use crate::status::JobStatus;
