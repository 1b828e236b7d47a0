use std::env;

use crate::{
  arena::ARENA_OVERHEAD,
  block::{BLOCK_ALIGN, BLOCK_OVERHEAD},
  error::ConfigError,
  logging::heap_log,
  page::DEFAULT_GRANULARITY,
};

/// Environment variable overriding [`HeapConfig::granularity`].
pub const GRANULARITY_VAR: &str = "RARENA_GRANULARITY";

/// Environment variable setting [`HeapConfig::limit`].
pub const LIMIT_VAR: &str = "RARENA_LIMIT";

/// Settings for an mmap-backed [`Heap`](crate::Heap).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
  /// Every arena request is rounded up to a multiple of this.
  pub granularity: usize,
  /// Upper bound on the bytes drawn from the kernel, if any.
  pub limit: Option<usize>,
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self {
      granularity: DEFAULT_GRANULARITY,
      limit: None,
    }
  }
}

impl HeapConfig {
  /// Defaults overridden by `RARENA_GRANULARITY` and `RARENA_LIMIT`.
  ///
  /// Values that do not parse, and a granularity [`validate`] rejects, are
  /// ignored with a warning.
  ///
  /// [`validate`]: HeapConfig::validate
  pub fn from_env() -> Self {
    let mut config = Self::default();

    if let Some(granularity) = read_var(GRANULARITY_VAR) {
      let candidate = Self {
        granularity,
        ..config
      };
      match candidate.validate() {
        Ok(()) => config.granularity = granularity,
        Err(err) => heap_log!(warn, "ignoring {}={}: {}", GRANULARITY_VAR, granularity, err),
      }
    }
    config.limit = read_var(LIMIT_VAR);

    config
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    let minimum = ARENA_OVERHEAD + BLOCK_OVERHEAD;
    if self.granularity <= minimum {
      return Err(ConfigError::GranularityTooSmall {
        granularity: self.granularity,
        minimum: minimum + 1,
      });
    }

    if self.granularity % BLOCK_ALIGN != 0 {
      return Err(ConfigError::MisalignedGranularity(self.granularity));
    }

    Ok(())
  }
}

fn read_var(name: &str) -> Option<usize> {
  let value = env::var(name).ok()?;
  match value.trim().parse() {
    Ok(parsed) => Some(parsed),
    Err(_) => {
      heap_log!(warn, "ignoring {}={:?}: not a byte count", name, value);
      None
    }
  }
}
