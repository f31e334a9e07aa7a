mod geo_data;
mod ip_address;

pub use geo_data::GeoData;
pub use ip_address::{normalize_ip, normalize_ips, validate_batch_ips};
