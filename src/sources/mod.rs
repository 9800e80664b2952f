//! Network collaborators of the restock check.

use async_trait::async_trait;

use crate::models::Listing;

pub mod http;

pub use http::{HttpListingFetcher, HttpPageProber, build_client};

/// Is the page at `url` currently reachable with a success status.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageProber: Send + Sync {
    /// Any failure, including a timeout, reads as inactive.
    async fn is_active(&self, url: &str) -> bool;
}

/// Current listings of a deal source.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ListingFetcher: Send + Sync {
    /// Empty on any failure.
    async fn fetch(&self, endpoint: &str) -> Vec<Listing>;
}
