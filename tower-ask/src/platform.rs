/// Shows the platform's own review prompt.
///
/// Only invoked from the eligible branch. The platform may rate-limit the
/// prompt itself, in which case a call is a harmless no-op.
pub trait PromptTrigger: Send + Sync {
    fn show_native_prompt(&self);
}

impl<F> PromptTrigger for F
where
    F: Fn() + Send + Sync,
{
    fn show_native_prompt(&self) {
        self()
    }
}

/// A trigger that does nothing, for hosts without a native prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPrompt;

impl PromptTrigger for NoopPrompt {
    fn show_native_prompt(&self) {}
}

/// Reports the running app version. Read once per evaluation.
pub trait VersionSource: Send + Sync {
    fn current_version(&self) -> String;
}

impl<F> VersionSource for F
where
    F: Fn() -> String + Send + Sync,
{
    fn current_version(&self) -> String {
        self()
    }
}

/// A version fixed at build or start-up time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticVersion(pub String);

impl StaticVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }
}

impl VersionSource for StaticVersion {
    fn current_version(&self) -> String {
        self.0.clone()
    }
}
