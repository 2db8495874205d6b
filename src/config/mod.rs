//! Typed pipeline configuration.
//!
//! Loads an [`EnvironmentProfile`]'s hardcoded defaults, then layers
//! per-variable overrides from the process environment on top. There is no
//! config file of its own here, only profiles and environment variables.

use anyhow::{Result, bail};
use std::str::FromStr;

/// Named environment tiers. Each carries its own token-budget defaults,
/// reflecting that a larger-context account can afford bigger chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvironmentProfile {
    #[default]
    Api,
    Pro,
    Max5,
    Max20,
}

impl FromStr for EnvironmentProfile {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "api" => Ok(Self::Api),
            "pro" => Ok(Self::Pro),
            "max5" => Ok(Self::Max5),
            "max20" => Ok(Self::Max20),
            other => bail!(
                "Invalid CLAUDE_ENVIRONMENT '{other}'. Valid values: api, pro, max5, max20"
            ),
        }
    }
}

impl std::fmt::Display for EnvironmentProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Api => "api",
            Self::Pro => "pro",
            Self::Max5 => "max5",
            Self::Max20 => "max20",
        };
        write!(f, "{s}")
    }
}

/// Target sizes derived from the chunk context budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkSizeTargets {
    pub min: u64,
    pub target: u64,
    pub max: u64,
}

impl ChunkSizeTargets {
    fn derive(budget: u64) -> Self {
        Self {
            min: (budget as f64 * 0.50) as u64,
            target: (budget as f64 * 0.65) as u64,
            max: (budget as f64 * 0.70) as u64,
        }
    }
}

/// Absolute-token context levels derived from the fractional thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextThresholds {
    pub warning: u64,
    pub critical: u64,
    pub emergency: u64,
}

impl ContextThresholds {
    fn derive(budget: u64, warning_frac: f64, critical_frac: f64, emergency_frac: f64) -> Self {
        Self {
            warning: (budget as f64 * warning_frac) as u64,
            critical: (budget as f64 * critical_frac) as u64,
            emergency: (budget as f64 * emergency_frac) as u64,
        }
    }
}

/// Immutable configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub profile: EnvironmentProfile,
    pub chunk_context_budget: u64,
    pub handoff_target_size: u64,
    pub handoff_max_size: u64,
    pub warning_threshold: f64,
    pub critical_threshold: f64,
    pub emergency_threshold: f64,
    pub max_chunk_retries: u32,
    pub max_compile_fix_retries: u32,
    /// Explicit Xcode scheme override. `None` means fall back to the first
    /// scheme listed by `xcodebuild -list`.
    pub xcode_scheme: Option<String>,
}

/// Raw per-profile defaults before environment overrides are applied.
struct ProfileDefaults {
    chunk_context_budget: u64,
    handoff_target_size: u64,
    handoff_max_size: u64,
    warning_threshold: f64,
    critical_threshold: f64,
    emergency_threshold: f64,
    max_chunk_retries: u32,
    max_compile_fix_retries: u32,
}

fn defaults_for(profile: EnvironmentProfile) -> ProfileDefaults {
    match profile {
        EnvironmentProfile::Api => ProfileDefaults {
            chunk_context_budget: 40_000,
            handoff_target_size: 1_500,
            handoff_max_size: 4_000,
            warning_threshold: 0.60,
            critical_threshold: 0.80,
            emergency_threshold: 0.95,
            max_chunk_retries: 2,
            max_compile_fix_retries: 3,
        },
        EnvironmentProfile::Pro => ProfileDefaults {
            chunk_context_budget: 80_000,
            handoff_target_size: 2_000,
            handoff_max_size: 5_000,
            warning_threshold: 0.60,
            critical_threshold: 0.80,
            emergency_threshold: 0.95,
            max_chunk_retries: 2,
            max_compile_fix_retries: 3,
        },
        EnvironmentProfile::Max5 => ProfileDefaults {
            chunk_context_budget: 150_000,
            handoff_target_size: 2_500,
            handoff_max_size: 6_000,
            warning_threshold: 0.65,
            critical_threshold: 0.82,
            emergency_threshold: 0.95,
            max_chunk_retries: 3,
            max_compile_fix_retries: 4,
        },
        EnvironmentProfile::Max20 => ProfileDefaults {
            chunk_context_budget: 180_000,
            handoff_target_size: 3_000,
            handoff_max_size: 7_000,
            warning_threshold: 0.65,
            critical_threshold: 0.82,
            emergency_threshold: 0.95,
            max_chunk_retries: 3,
            max_compile_fix_retries: 4,
        },
    }
}

impl PipelineConfig {
    /// Build a config for a profile with no environment overrides applied.
    pub fn for_profile(profile: EnvironmentProfile) -> Result<Self> {
        let d = defaults_for(profile);
        let config = Self {
            profile,
            chunk_context_budget: d.chunk_context_budget,
            handoff_target_size: d.handoff_target_size,
            handoff_max_size: d.handoff_max_size,
            warning_threshold: d.warning_threshold,
            critical_threshold: d.critical_threshold,
            emergency_threshold: d.emergency_threshold,
            max_chunk_retries: d.max_chunk_retries,
            max_compile_fix_retries: d.max_compile_fix_retries,
            xcode_scheme: None,
        };
        config.validate()?;
        Ok(config)
    }

    /// Build a config from `CLAUDE_ENVIRONMENT` and the per-variable
    /// environment overrides below.
    pub fn from_env() -> Result<Self> {
        let profile = match std::env::var("CLAUDE_ENVIRONMENT") {
            Ok(v) => v.parse()?,
            Err(_) => EnvironmentProfile::default(),
        };
        let mut config = Self::for_profile(profile)?;

        if let Some(v) = env_u64("CHUNK_CONTEXT_BUDGET")? {
            config.chunk_context_budget = v;
        }
        if let Some(v) = env_u64("HANDOFF_TARGET_SIZE")? {
            config.handoff_target_size = v;
        }
        if let Some(v) = env_u64("HANDOFF_MAX_SIZE")? {
            config.handoff_max_size = v;
        }
        if let Some(v) = env_u32("MAX_CHUNK_RETRIES")? {
            config.max_chunk_retries = v;
        }
        if let Some(v) = env_u32("MAX_COMPILE_FIX_RETRIES")? {
            config.max_compile_fix_retries = v;
        }
        if let Some(v) = env_f64("CONTEXT_WARNING_THRESHOLD")? {
            config.warning_threshold = v;
        }
        if let Some(v) = env_f64("CONTEXT_CRITICAL_THRESHOLD")? {
            config.critical_threshold = v;
        }
        if let Some(v) = env_f64("CONTEXT_EMERGENCY_THRESHOLD")? {
            config.emergency_threshold = v;
        }
        if let Ok(v) = std::env::var("ADW_XCODE_SCHEME") {
            config.xcode_scheme = Some(v);
        }

        config.validate()?;
        tracing::info!(
            profile = %config.profile,
            chunk_context_budget = config.chunk_context_budget,
            "resolved pipeline configuration"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(self.warning_threshold < self.critical_threshold
            && self.critical_threshold < self.emergency_threshold
            && self.emergency_threshold <= 1.0)
        {
            bail!(
                "context thresholds must satisfy warning < critical < emergency <= 1.0 \
                 (got warning={}, critical={}, emergency={})",
                self.warning_threshold,
                self.critical_threshold,
                self.emergency_threshold
            );
        }
        Ok(())
    }

    pub fn chunk_size_targets(&self) -> ChunkSizeTargets {
        ChunkSizeTargets::derive(self.chunk_context_budget)
    }

    pub fn context_thresholds(&self) -> ContextThresholds {
        ContextThresholds::derive(
            self.chunk_context_budget,
            self.warning_threshold,
            self.critical_threshold,
            self.emergency_threshold,
        )
    }
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(v) => Ok(Some(
            v.parse()
                .map_err(|_| anyhow::anyhow!("{name} must be an integer, got '{v}'"))?,
        )),
        Err(_) => Ok(None),
    }
}

fn env_u32(name: &str) -> Result<Option<u32>> {
    Ok(env_u64(name)?.map(|v| v as u32))
}

fn env_f64(name: &str) -> Result<Option<f64>> {
    match std::env::var(name) {
        Ok(v) => Ok(Some(
            v.parse()
                .map_err(|_| anyhow::anyhow!("{name} must be a float, got '{v}'"))?,
        )),
        Err(_) => Ok(None),
    }
}
