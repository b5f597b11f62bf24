use utils_setters_derive::Setters;

/// Extension appended to artifact names unless configured otherwise.
pub const DEFAULT_SUFFIX: &str = "bin";

/// Copy block size in bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// What happens to the remaining sub-images after one fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Report the failure and continue with the next table entry.
    #[default]
    Continue,
    /// Stop the walk at the first failed sub-image.
    FailFast,
}

/// Optional integrity checks. All disabled by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Setters)]
pub struct Validation {
    /// Require [`uimage_abi::IMAGE_MAGIC`] in every header.
    pub magic: bool,
    /// Require a matching header CRC-32 in every header.
    pub header_crc: bool,
    /// Require each sub-image payload to match its header's data CRC-32.
    pub data_crc: bool,
}

impl Validation {
    #[must_use]
    pub const fn all() -> Self {
        Self {
            magic: true,
            header_crc: true,
            data_crc: true,
        }
    }
}

/// Settings shared by the walker and the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    suffix: String,
    block_size: usize,
    failure_policy: FailurePolicy,
    validation: Validation,
    require_multi: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            suffix: DEFAULT_SUFFIX.to_owned(),
            block_size: DEFAULT_BLOCK_SIZE,
            failure_policy: FailurePolicy::default(),
            validation: Validation::default(),
            require_multi: true,
        }
    }
}

impl ExtractOptions {
    /// Extension appended to artifact names; empty for none. A leading dot
    /// is dropped.
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        let suffix = suffix.into();
        self.suffix = suffix.strip_prefix('.').unwrap_or(&suffix).to_owned();
        self
    }

    /// Copy block size, clamped to at least one byte.
    #[must_use]
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    #[must_use]
    pub const fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    #[must_use]
    pub const fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    /// Reject containers whose image type is not multi before reading the
    /// size table.
    #[must_use]
    pub const fn with_require_multi(mut self, require_multi: bool) -> Self {
        self.require_multi = require_multi;
        self
    }

    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    #[must_use]
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    #[must_use]
    pub const fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    #[must_use]
    pub const fn validation(&self) -> Validation {
        self.validation
    }

    #[must_use]
    pub const fn require_multi(&self) -> bool {
        self.require_multi
    }
}
