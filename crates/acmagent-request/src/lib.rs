//! acmagent request: build and send ACM `RequestCertificate` calls.

pub mod acm;
pub mod certificate;
pub mod error;
pub mod sigv4;

pub use acm::{certificate_id_from_arn, AcmClient};
pub use certificate::{read_json_input, Certificate};
pub use error::RequestError;
pub use sigv4::AwsCredentials;
