// context.rs — Generation context and shared compile parameters
//
// Build-wide settings that every generation request sees: floating-point
// width, host parallelism, vectorization target, accelerator availability
// and the C++ namespace of generated classes. Loaded from JSON or built from
// defaults, then overridden by command-line flags.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GenError;
use crate::field::DType;
use crate::kernel::{CompileParams, Target, VectorizeInfo};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationContext {
    pub double_accuracy: bool,
    pub openmp: bool,
    pub optimize_for_localhost: bool,
    /// When false, accelerator-target requests are skipped.
    pub cuda: bool,
    pub namespace: String,
}

impl Default for GenerationContext {
    fn default() -> Self {
        GenerationContext {
            double_accuracy: true,
            openmp: false,
            optimize_for_localhost: false,
            cuda: true,
            namespace: "sgen".to_string(),
        }
    }
}

impl GenerationContext {
    pub fn from_json(text: &str) -> Result<Self, GenError> {
        serde_json::from_str(text)
            .map_err(|e| GenError::config(format!("invalid generation context: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self, GenError> {
        let text = std::fs::read_to_string(path).map_err(|source| GenError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn element_type(&self) -> DType {
        if self.double_accuracy {
            DType::Float64
        } else {
            DType::Float32
        }
    }

    /// Whether requests for `target` produce artifacts in this build.
    pub fn supports(&self, target: Target) -> bool {
        target == Target::Cpu || self.cuda
    }
}

/// Kernel-compiler parameters shared by every kernel of one request.
pub fn default_compile_params(ctx: &GenerationContext, target: Target) -> CompileParams {
    let mut params = CompileParams::new(target, ctx.element_type());
    params.cpu_openmp = ctx.openmp;
    params.vectorize = VectorizeInfo {
        instruction_set: if ctx.optimize_for_localhost {
            Some("native".to_string())
        } else {
            None
        },
        assume_inner_stride_one: true,
        assume_aligned: false,
        nontemporal: false,
    };
    params
}
