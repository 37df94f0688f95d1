//! AWS-backed implementations of the capability contracts.
//!
//! Each adapter owns one SDK client and translates between the wire shapes
//! and the domain types in [`crate::provider`]. Semantic classification of
//! provider replies (stack does not exist, no updates to perform, resource
//! not found) happens here, at the seam, so the orchestration logic above
//! never parses provider error strings.

pub mod apigateway;
pub mod cloudformation;
pub mod lambda;
pub mod s3;
pub mod session;
pub mod ssm;

pub use apigateway::ApiGatewayRoutes;
pub use cloudformation::CloudFormationStacks;
pub use lambda::LambdaFunctions;
pub use s3::S3Objects;
pub use session::SessionFactory;
pub use ssm::SsmParameters;
