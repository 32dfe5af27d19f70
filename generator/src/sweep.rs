// sweep.rs — Sweep kernel synthesis
//
// Compiles one stencil update into a kernel named after its sweep class and
// attaches the call-site metadata: ping-pong swap pairs and the varying
// parameters that must stay in the constructor signature.
//
// Preconditions: swap temporaries are written or read by the kernel.
// Postconditions: concrete parameter values are folded into the kernel; the
//                 returned `KernelInfo` carries swaps and varying parameters.
// Failure modes: `Configuration` for a varying parameter bound to a concrete
//                value, a swap pair naming one field twice, a temporary the
//                kernel never accesses, or a field swapped more than once.
// Side effects: none (logs at debug level).

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::error::GenError;
use crate::field::Assignment;
use crate::kernel::{
    CompileParams, FieldSwap, Kernel, KernelCompiler, KernelInfo, VaryingParameter,
};

#[derive(Debug, Clone, Default)]
pub struct SweepRequest {
    pub class_name: String,
    pub assignments: Vec<Assignment>,
    /// Parameters with a concrete value; substituted before compilation.
    pub constants: BTreeMap<String, f64>,
    pub field_swaps: Vec<FieldSwap>,
    /// Parameters kept in the call signature even when unused.
    pub varying: Vec<String>,
}

pub fn generate_sweep<C: KernelCompiler>(
    request: &SweepRequest,
    compiler: &C,
    params: &CompileParams,
) -> Result<KernelInfo<C::Kernel>, GenError> {
    for name in &request.varying {
        if let Some(value) = request.constants.get(name) {
            return Err(GenError::config(format!(
                "varying parameter '{}' is bound to the concrete value {}; it must stay symbolic",
                name, value
            )));
        }
    }
    check_swaps(&request.field_swaps)?;

    let values: HashMap<String, f64> = request
        .constants
        .iter()
        .map(|(k, v)| (k.clone(), *v))
        .collect();
    let assignments: Vec<Assignment> = request
        .assignments
        .iter()
        .map(|a| Assignment::new(a.lhs.clone(), a.rhs.substitute(&values)))
        .collect();

    let mut kernel = compiler.compile(assignments, params)?;
    kernel.set_function_name(request.class_name.to_lowercase());

    for swap in &request.field_swaps {
        if !kernel.fields_accessed().iter().any(|f| f.name == swap.temporary) {
            return Err(GenError::config(format!(
                "temporary field '{}' is not accessed by sweep '{}'",
                swap.temporary, request.class_name
            )));
        }
    }

    let varying = request
        .varying
        .iter()
        .map(|name| VaryingParameter {
            name: name.clone(),
            dtype: params.data_type,
        })
        .collect();

    debug!(
        sweep = %request.class_name,
        kernel = kernel.function_name(),
        swaps = request.field_swaps.len(),
        "synthesized sweep kernel"
    );

    KernelInfo::new(kernel)
        .with_field_swaps(request.field_swaps.clone())
        .with_varying(varying)
}

fn check_swaps(swaps: &[FieldSwap]) -> Result<(), GenError> {
    let mut seen = HashSet::new();
    for s in swaps {
        if s.field == s.temporary {
            return Err(GenError::config(format!(
                "field '{}' cannot be swapped with itself",
                s.field
            )));
        }
        for name in [&s.field, &s.temporary] {
            if !seen.insert(name.as_str()) {
                return Err(GenError::config(format!(
                    "field '{}' takes part in more than one swap",
                    name
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::Offset;
    use crate::field::{BinOp, DType, Expr, Field};
    use crate::kernel::{Binding, KernelParameter, SignatureEntry, Target};
    use crate::loop_kernel::LoopKernelCompiler;

    fn request() -> SweepRequest {
        let src = Field::new("src", DType::Float64);
        let dst = Field::new("dst", DType::Float64);
        let rhs = Expr::binary(
            BinOp::Mul,
            Expr::Symbol("omega".into()),
            Expr::binary(
                BinOp::Add,
                Expr::Access(src.at(Offset::new(0, 1, 0), vec![])),
                Expr::Symbol("dt".into()),
            ),
        );
        SweepRequest {
            class_name: "Jacobi".into(),
            assignments: vec![Assignment::new(dst.center(vec![]), rhs)],
            constants: [("dt".to_string(), 0.5)].into_iter().collect(),
            field_swaps: vec![FieldSwap {
                field: "src".into(),
                temporary: "dst".into(),
            }],
            varying: vec!["beta".into()],
        }
    }

    fn params() -> CompileParams {
        CompileParams::new(Target::Cpu, DType::Float64)
    }

    #[test]
    fn constants_are_folded_and_kernel_is_named() {
        let info = generate_sweep(&request(), &LoopKernelCompiler::new(), &params()).unwrap();
        assert_eq!(info.function_name(), "jacobi");
        let scalars: Vec<String> = info
            .parameters()
            .iter()
            .filter(|p| matches!(p, KernelParameter::Scalar { .. }))
            .map(|p| p.name())
            .collect();
        assert_eq!(scalars, vec!["omega"]);
    }

    #[test]
    fn varying_parameters_stay_in_the_signature() {
        let info = generate_sweep(&request(), &LoopKernelCompiler::new(), &params()).unwrap();
        assert_eq!(
            info.signature(),
            vec![
                SignatureEntry::Field { name: "src".into() },
                SignatureEntry::Scalar {
                    name: "beta".into(),
                    dtype: DType::Float64,
                    binding: Binding::Ignored
                },
                SignatureEntry::Scalar {
                    name: "omega".into(),
                    dtype: DType::Float64,
                    binding: Binding::Kernel
                },
            ]
        );
        assert!(info.is_temporary("dst"));
    }

    #[test]
    fn concrete_varying_parameter_is_a_configuration_error() {
        let mut req = request();
        req.varying.push("dt".into());
        let err = generate_sweep(&req, &LoopKernelCompiler::new(), &params()).unwrap_err();
        assert!(matches!(err, GenError::Configuration(_)));
    }

    #[test]
    fn temporary_must_be_accessed() {
        let mut req = request();
        req.field_swaps[0].temporary = "ghost".into();
        let err = generate_sweep(&req, &LoopKernelCompiler::new(), &params()).unwrap_err();
        assert!(err.to_string().contains("'ghost'"));
    }
}
