//! Source fetching infrastructure module

mod url_fetcher;

pub use url_fetcher::UrlFetcher;
