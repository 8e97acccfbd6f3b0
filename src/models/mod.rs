pub(crate) mod cloud;
mod ssh;
pub(crate) mod tpp;

pub use ssh::{
    parse_validity_period, SshCertRequest, SshCertRequestBuilder, SshCertificateDetails,
    SshConfigRequest, SshConfigResponse, SshRetrieveResponse,
};
pub(crate) use ssh::IssuedMaterial;
