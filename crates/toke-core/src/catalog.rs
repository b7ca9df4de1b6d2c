//! Installable model catalog.
//!
//! The catalog is a fixed table turned into [`ModelOption`] values on every
//! call to [`catalog`]. Availability depends on the [`Platform`] passed in, so
//! callers never observe stale entries and there is no shared mutable state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BackendError;

const GIB: u64 = 1024 * 1024 * 1024;

/// Reason attached to MLX entries on hosts that cannot run them.
pub const APPLE_SILICON_REQUIRED: &str = "Requires Apple Silicon (M1/M2/M3/M4) Mac";

/// Backend provider able to serve a catalog model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    /// Python MLX server, Apple Silicon only, multi-file safetensors weights.
    #[serde(rename = "mlx")]
    Mlx,
    /// llama.cpp `llama-server`, single-file GGUF weights.
    #[serde(rename = "llamacpp")]
    LlamaCpp,
}

impl Provider {
    /// Tag used in catalog data and on-disk layout.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mlx => "mlx",
            Self::LlamaCpp => "llamacpp",
        }
    }

    /// Human-readable provider name.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Mlx => "MLX",
            Self::LlamaCpp => "llama.cpp",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Provider {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mlx" => Ok(Self::Mlx),
            "llamacpp" | "llama.cpp" | "llama-cpp" => Ok(Self::LlamaCpp),
            other => Err(BackendError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// Coarse capability class of a catalog model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Bottom,
    Mid,
    Top,
}

impl Tier {
    pub const ALL: [Self; 3] = [Self::Bottom, Self::Mid, Self::Top];

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Bottom => "Light & Fast",
            Self::Mid => "Balanced",
            Self::Top => "Power User",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Bottom => "2-4GB models for quick responses. Runs on 8GB+ RAM.",
            Self::Mid => "8-12GB models with better quality. Needs 16GB+ RAM.",
            Self::Top => "40GB+ models for maximum capability. Requires 64GB+ RAM.",
        }
    }
}

/// Host platform facts that decide catalog availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Platform {
    pub apple_silicon: bool,
}

impl Platform {
    /// Platform this binary was compiled for.
    pub const fn current() -> Self {
        Self {
            apple_silicon: cfg!(all(target_os = "macos", target_arch = "aarch64")),
        }
    }

    pub const fn apple_silicon() -> Self {
        Self {
            apple_silicon: true,
        }
    }

    pub const fn generic() -> Self {
        Self {
            apple_silicon: false,
        }
    }

    /// Whether `provider` can run here, with the reason when it cannot.
    pub fn supports(self, provider: Provider) -> Result<(), &'static str> {
        match provider {
            Provider::Mlx if !self.apple_silicon => Err(APPLE_SILICON_REQUIRED),
            _ => Ok(()),
        }
    }
}

/// A model that can be downloaded and served locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelOption {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Download size in bytes.
    pub size: u64,
    /// Required RAM in bytes.
    pub memory: u64,
    /// Repository URL (MLX) or direct file URL (GGUF).
    pub url: String,
    /// Expected SHA-256, if one is known.
    pub checksum: Option<String>,
    pub provider: Provider,
    pub tier: Tier,
    pub recommended: bool,
    pub available: bool,
    pub unavailable_reason: Option<String>,
}

impl ModelOption {
    /// File name of a single-file model, taken from the last segment of a
    /// `.../resolve/<rev>/<file>` URL.
    pub fn file_name(&self) -> Option<&str> {
        if !self.url.contains("/resolve/") {
            return None;
        }
        self.url.rsplit('/').next().filter(|name| !name.is_empty())
    }
}

struct Entry {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    size: u64,
    memory: u64,
    url: &'static str,
    provider: Provider,
    tier: Tier,
    recommended: Recommended,
}

enum Recommended {
    Always,
    Never,
    /// Recommended only where Apple Silicon is absent.
    OffAppleSilicon,
}

const ENTRIES: &[Entry] = &[
    Entry {
        id: "glm-4.5-air-8bit",
        name: "GLM 4.5 Air 8-bit (MLX)",
        description: "Highest quality 107B GLM. Full 8-bit precision. MLX for Apple Silicon.",
        size: 110 * GIB,
        memory: 128 * GIB,
        url: "https://huggingface.co/lmstudio-community/GLM-4.5-Air-MLX-8bit",
        provider: Provider::Mlx,
        tier: Tier::Top,
        recommended: Recommended::Always,
    },
    Entry {
        id: "glm-4.5-air-4bit",
        name: "GLM 4.5 Air 4-bit (MLX)",
        description: "Cutting-edge 106B model. Great balance. MLX 4-bit for Apple Silicon.",
        size: 56 * GIB,
        memory: 24 * GIB,
        url: "https://huggingface.co/mlx-community/GLM-4.5-Air-4bit",
        provider: Provider::Mlx,
        tier: Tier::Mid,
        recommended: Recommended::Always,
    },
    Entry {
        id: "glm-4.5-air-3bit",
        name: "GLM 4.5 Air 3-bit (MLX)",
        description: "Same GLM model, smaller size. MLX 3-bit quantization.",
        size: 13 * GIB,
        memory: 16 * GIB,
        url: "https://huggingface.co/mlx-community/GLM-4.5-Air-3bit",
        provider: Provider::Mlx,
        tier: Tier::Bottom,
        recommended: Recommended::Never,
    },
    Entry {
        id: "qwen2.5-coder-7b-4bit",
        name: "Qwen 2.5 Coder 7B 4-bit (MLX)",
        description: "Excellent coding model. MLX 4-bit quantization.",
        size: 5 * GIB,
        memory: 8 * GIB,
        url: "https://huggingface.co/mlx-community/Qwen2.5-Coder-7B-Instruct-4bit",
        provider: Provider::Mlx,
        tier: Tier::Bottom,
        recommended: Recommended::Never,
    },
    Entry {
        id: "qwen2.5-coder-7b-q4_k_m",
        name: "Qwen 2.5 Coder 7B (GGUF)",
        description: "Best coding model. Fast and accurate. GGUF Q4_K_M quantization.",
        size: 4_794_158_596,
        memory: 8 * GIB,
        url: "https://huggingface.co/Qwen/Qwen2.5-Coder-7B-Instruct-GGUF/resolve/main/qwen2.5-coder-7b-instruct-q4_k_m.gguf",
        provider: Provider::LlamaCpp,
        tier: Tier::Bottom,
        recommended: Recommended::OffAppleSilicon,
    },
    Entry {
        id: "qwen2.5-3b-q4_k_m",
        name: "Qwen 2.5 3B (GGUF)",
        description: "Smaller, faster model. Good for simple tasks. GGUF format.",
        size: 2 * GIB,
        memory: 4 * GIB,
        url: "https://huggingface.co/Qwen/Qwen2.5-3B-Instruct-GGUF/resolve/main/qwen2.5-3b-instruct-q4_k_m.gguf",
        provider: Provider::LlamaCpp,
        tier: Tier::Bottom,
        recommended: Recommended::Never,
    },
    Entry {
        id: "qwen2.5-14b-q4_k_m",
        name: "Qwen 2.5 14B (GGUF)",
        description: "Larger, more capable model. Excellent reasoning. GGUF format.",
        size: 8 * GIB,
        memory: 16 * GIB,
        url: "https://huggingface.co/Qwen/Qwen2.5-14B-Instruct-GGUF/resolve/main/qwen2.5-14b-instruct-q4_k_m.gguf",
        provider: Provider::LlamaCpp,
        tier: Tier::Mid,
        recommended: Recommended::Always,
    },
    Entry {
        id: "deepseek-coder-v2-lite-q4_k_m",
        name: "DeepSeek Coder V2 Lite (GGUF)",
        description: "Specialized for code generation. 16B parameters. GGUF format.",
        size: 9 * GIB,
        memory: 18 * GIB,
        url: "https://huggingface.co/deepseek-ai/DeepSeek-Coder-V2-Lite-Instruct-GGUF/resolve/main/deepseek-coder-v2-lite-instruct-q4_k_m.gguf",
        provider: Provider::LlamaCpp,
        tier: Tier::Mid,
        recommended: Recommended::Never,
    },
    Entry {
        id: "glm-4.5-air-q2_k",
        name: "GLM 4.5 Air Q2_K (GGUF)",
        description: "Massive 107B parameter model with standard 2-bit quantization.",
        size: 45 * GIB,
        memory: 48 * GIB,
        url: "https://huggingface.co/unsloth/GLM-4.5-Air-GGUF/resolve/main/GLM-4.5-Air-Q2_K.gguf",
        provider: Provider::LlamaCpp,
        tier: Tier::Top,
        recommended: Recommended::Always,
    },
];

/// Build the catalog for `platform`.
pub fn catalog(platform: Platform) -> Vec<ModelOption> {
    ENTRIES
        .iter()
        .map(|entry| {
            let support = platform.supports(entry.provider);
            let recommended = match entry.recommended {
                Recommended::Always => true,
                Recommended::Never => false,
                Recommended::OffAppleSilicon => !platform.apple_silicon,
            };
            ModelOption {
                id: entry.id.to_string(),
                name: entry.name.to_string(),
                description: entry.description.to_string(),
                size: entry.size,
                memory: entry.memory,
                url: entry.url.to_string(),
                // Upstream publishes no digests for these repositories yet.
                checksum: None,
                provider: entry.provider,
                tier: entry.tier,
                recommended,
                available: support.is_ok(),
                unavailable_reason: support.err().map(str::to_string),
            }
        })
        .collect()
}

pub fn model_by_id<'a>(models: &'a [ModelOption], id: &str) -> Option<&'a ModelOption> {
    models.iter().find(|m| m.id == id)
}

/// Default pick: GLM 4.5 Air 4-bit when the host can run it, otherwise the
/// first available entry.
pub fn recommended_model(models: &[ModelOption]) -> Option<&ModelOption> {
    models
        .iter()
        .find(|m| m.id == "glm-4.5-air-4bit" && m.available)
        .or_else(|| models.iter().find(|m| m.available))
}

pub fn models_by_tier(models: &[ModelOption], tier: Tier) -> Vec<&ModelOption> {
    models.iter().filter(|m| m.tier == tier).collect()
}

/// Recommended available model of `tier`, falling back to the tier's first
/// available entry.
pub fn recommended_by_tier(models: &[ModelOption], tier: Tier) -> Option<&ModelOption> {
    let in_tier: Vec<&ModelOption> = models
        .iter()
        .filter(|m| m.tier == tier && m.available)
        .collect();
    in_tier
        .iter()
        .copied()
        .find(|m| m.recommended)
        .or_else(|| in_tier.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mlx_entries_unavailable_off_apple_silicon() {
        let models = catalog(Platform::generic());
        let mlx: Vec<_> = models
            .iter()
            .filter(|m| m.provider == Provider::Mlx)
            .collect();

        assert_eq!(mlx.len(), 4);
        for model in mlx {
            assert!(!model.available);
            assert_eq!(
                model.unavailable_reason.as_deref(),
                Some(APPLE_SILICON_REQUIRED)
            );
        }
    }

    #[test]
    fn recommended_model_depends_on_platform() {
        let apple = catalog(Platform::apple_silicon());
        assert_eq!(recommended_model(&apple).unwrap().id, "glm-4.5-air-4bit");

        let generic = catalog(Platform::generic());
        let pick = recommended_model(&generic).unwrap();
        assert_eq!(pick.id, "qwen2.5-coder-7b-q4_k_m");
        assert!(pick.recommended);
    }

    #[test]
    fn recommended_by_tier_skips_unavailable() {
        let generic = catalog(Platform::generic());
        let mid = recommended_by_tier(&generic, Tier::Mid).unwrap();
        assert_eq!(mid.id, "qwen2.5-14b-q4_k_m");

        let apple = catalog(Platform::apple_silicon());
        let mid = recommended_by_tier(&apple, Tier::Mid).unwrap();
        assert_eq!(mid.id, "glm-4.5-air-4bit");
    }

    #[test]
    fn models_by_tier_groups_entries() {
        let models = catalog(Platform::apple_silicon());
        let top = models_by_tier(&models, Tier::Top);
        assert!(top.iter().all(|m| m.tier == Tier::Top));
        assert!(top.iter().any(|m| m.id == "glm-4.5-air-8bit"));
    }

    #[test]
    fn provider_parsing_rejects_unknown_tags() {
        assert_eq!("mlx".parse::<Provider>().unwrap(), Provider::Mlx);
        assert_eq!("llamacpp".parse::<Provider>().unwrap(), Provider::LlamaCpp);

        let err = "onnx".parse::<Provider>().unwrap_err();
        assert!(matches!(err, BackendError::UnsupportedProvider(ref tag) if tag == "onnx"));
    }

    #[test]
    fn gguf_file_name_comes_from_url() {
        let models = catalog(Platform::generic());
        let qwen = model_by_id(&models, "qwen2.5-3b-q4_k_m").unwrap();
        assert_eq!(qwen.file_name(), Some("qwen2.5-3b-instruct-q4_k_m.gguf"));

        let mlx = model_by_id(&models, "glm-4.5-air-3bit").unwrap();
        assert_eq!(mlx.file_name(), None);
    }

    #[test]
    fn tier_names() {
        assert_eq!(Tier::Bottom.display_name(), "Light & Fast");
        assert_eq!(Tier::Mid.display_name(), "Balanced");
        assert_eq!(Tier::Top.display_name(), "Power User");
    }
}
