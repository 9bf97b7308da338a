//! This crate bridges standard X.509 tooling and the national SM2/SM3
//! certificate ecosystem. It provides a crypto provider abstraction over
//! both algorithm suites, a lossless certificate model bridge between the
//! two representations, a PKCS#10 request builder for national keys and
//! the enrollment authentication token protocol built on top of them.
//!
//! ## References
//!
//! - <https://datatracker.ietf.org/doc/html/rfc5280>
//! - <https://datatracker.ietf.org/doc/html/rfc2986>
//! - GB/T 32918 (SM2) and GB/T 32905 (SM3)

pub mod cert;
pub mod csr;
pub mod provider;
pub mod token;
