pub mod catalog;
pub mod client;

pub mod mock;

pub use catalog::{fetch_catalog, list_managers, CatalogSources};
pub use client::{PlatformConfig, VantiqClient, VantiqClientFactory};
pub use mock::{
    MockCall, MockPlatform, MockPlatformFactory, MockTarget, MOCK_ACCESS_TOKEN, MOCK_AUTH_FAILURE_BODY,
};
