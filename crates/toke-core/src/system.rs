//! Host capability data and model recommendation.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{
    ModelOption, Platform, Provider, Tier, model_by_id, recommended_by_tier, recommended_model,
};
use crate::format::whole_gib;

bitflags! {
    /// Figures in [`SystemInfo`] that came from a fallback instead of a
    /// measurement.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Estimated: u8 {
        const TOTAL_RAM     = 0b0001;
        const AVAILABLE_RAM = 0b0010;
        const FREE_DISK     = 0b0100;
    }
}

/// Snapshot of host capabilities. Computed on demand, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Total RAM in bytes.
    pub total_ram: u64,
    /// Available RAM in bytes.
    pub available_ram: u64,
    pub cpu_cores: usize,
    pub is_apple_silicon: bool,
    pub has_nvidia_gpu: bool,
    pub has_amd_gpu: bool,
    /// Free bytes on the filesystem holding the data directory.
    pub free_disk_space: u64,
    pub estimated: Estimated,
}

impl SystemInfo {
    pub const fn platform(&self) -> Platform {
        Platform {
            apple_silicon: self.is_apple_silicon,
        }
    }

    /// True when any figure is a guess.
    pub const fn is_estimated(&self) -> bool {
        !self.estimated.is_empty()
    }
}

const MAX_RECOMMENDATIONS: usize = 3;

enum Pick {
    Id(&'static str),
    TierRecommended(Tier),
    Recommended,
}

/// `(min RAM GiB, min free disk GiB, pick)`, evaluated in order.
const APPLE_SILICON_RULES: &[(u64, u64, Pick)] = &[
    (48, 40, Pick::Id("glm-4.5-air-8bit")),
    (24, 60, Pick::Id("glm-4.5-air-4bit")),
    (16, 15, Pick::Id("glm-4.5-air-3bit")),
    (8, 6, Pick::Id("qwen2.5-coder-7b-4bit")),
];

const GENERAL_RULES: &[(u64, u64, Pick)] = &[
    (64, 50, Pick::Id("glm-4.5-air-q2_k")),
    (16, 10, Pick::TierRecommended(Tier::Mid)),
    (8, 5, Pick::Recommended),
    (4, 3, Pick::Id("qwen2.5-3b-q4_k_m")),
];

/// Up to three models the host can plausibly run, largest-capable tier first.
///
/// Candidates that are unavailable on the platform or whose memory
/// requirement exceeds total RAM are skipped. When nothing qualifies the
/// smallest available model is returned on its own.
pub fn recommend_models(info: &SystemInfo, catalog: &[ModelOption]) -> Vec<ModelOption> {
    let ram_gb = whole_gib(info.total_ram);
    let disk_gb = whole_gib(info.free_disk_space);

    let platform_rules: &[(u64, u64, Pick)] = if info.is_apple_silicon {
        APPLE_SILICON_RULES
    } else {
        &[]
    };

    let mut picks: Vec<ModelOption> = Vec::new();
    for (min_ram, min_disk, pick) in platform_rules.iter().chain(GENERAL_RULES) {
        if ram_gb < *min_ram || disk_gb < *min_disk {
            continue;
        }
        let candidate = match pick {
            Pick::Id(id) => model_by_id(catalog, id),
            Pick::TierRecommended(tier) => recommended_by_tier(catalog, *tier),
            Pick::Recommended => recommended_model(catalog),
        };
        let Some(model) = candidate else { continue };
        if !model.available || model.memory > info.total_ram {
            debug!(model = %model.id, "Skipping recommendation that does not fit host");
            continue;
        }
        if picks.iter().any(|p| p.id == model.id) {
            continue;
        }
        picks.push(model.clone());
    }

    if picks.is_empty() {
        if let Some(smallest) = catalog
            .iter()
            .filter(|m| m.available)
            .min_by_key(|m| (m.memory, m.size))
        {
            picks.push(smallest.clone());
        }
    }

    picks.truncate(MAX_RECOMMENDATIONS);
    picks
}

/// Preferred single model for unattended setup.
///
/// Apple Silicon takes the catalog's recommended MLX model, anything else the
/// overall recommended model. A pick that needs more RAM than the host has is
/// replaced by the first fitting recommendation.
pub fn quick_setup_model(info: &SystemInfo, catalog: &[ModelOption]) -> Option<ModelOption> {
    let preferred = if info.is_apple_silicon {
        catalog
            .iter()
            .find(|m| m.provider == Provider::Mlx && m.recommended && m.available)
    } else {
        recommended_model(catalog)
    };
    if let Some(model) = preferred
        && model.memory <= info.total_ram
    {
        return Some(model.clone());
    }

    let picks = recommend_models(info, catalog);
    let mlx = info
        .is_apple_silicon
        .then(|| picks.iter().find(|m| m.provider == Provider::Mlx).cloned())
        .flatten();
    mlx.or_else(|| picks.into_iter().next())
}

/// Display string comparing a model's needs with host resources, e.g.
/// `RAM: ✓ 8GB/16GB | Disk: ✗ 13GB/10GB`.
pub fn format_requirement(model: &ModelOption, info: &SystemInfo) -> String {
    let total_ram = whole_gib(info.total_ram);
    let free_disk = whole_gib(info.free_disk_space);
    let model_ram = whole_gib(model.memory);
    let model_disk = whole_gib(model.size);

    let mark = |ok: bool| if ok { "✓" } else { "✗" };

    format!(
        "RAM: {} {model_ram}GB/{total_ram}GB | Disk: {} {model_disk}GB/{free_disk}GB",
        mark(model_ram <= total_ram),
        mark(model_disk <= free_disk),
    )
}
