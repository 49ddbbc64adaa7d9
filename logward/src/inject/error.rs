use snafu::Snafu;

#[derive(Clone, Debug, Eq, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// A field the sidecar cannot run without was empty after combining the
    /// process defaults with the pod's annotations.
    #[snafu(display("{field} is required"))]
    MissingRequiredConfig { field: &'static str },
}
