use super::MAPPING;
use crate::common::TypeInfo;
use annogen_cache::{Fragment, GenerationContext, Generator};
use annogen_core::{AnnogenError, InterfaceDecl, MethodSpec, NodeMeta, Result};
use std::fmt::Write as _;

const RECEIVER: &str = "m";
const DST: &str = "dst";

/// Emits a struct implementing every method of an annotated interface.
///
/// Each method must take one argument and return the mapped value,
/// optionally followed by `error`. `@Mapping(target="A", source="B")` on a
/// method copies `src.B` into `dst.A`.
pub struct MapperGenerator {
    struct_name: String,
    decl: InterfaceDecl,
    meta: NodeMeta,
}

impl MapperGenerator {
    pub fn new(struct_name: impl Into<String>, decl: InterfaceDecl, meta: NodeMeta) -> Self {
        Self {
            struct_name: struct_name.into(),
            decl,
            meta,
        }
    }

    fn method(
        &self,
        ctx: &mut GenerationContext<'_>,
        receiver: &str,
        method: &MethodSpec,
        code: &mut String,
    ) -> Result<String> {
        let fallible = match method.results.as_slice() {
            [_] => false,
            [_, err] if err.type_expr == "error" => true,
            _ => return Err(self.bad_signature(method)),
        };
        let [src] = method.params.as_slice() else {
            return Err(self.bad_signature(method));
        };
        if src.type_expr.starts_with("...") {
            return Err(self.bad_signature(method));
        }

        let src_name = match src.name.as_deref() {
            Some(name) if name != "_" => name.to_string(),
            _ => "src".to_string(),
        };
        let src_type = ctx.qualify(&src.type_expr, &self.meta)?;
        let dst_type = ctx.qualify(&method.results[0].type_expr, &self.meta)?;
        let ret = if fallible {
            format!("({}, error)", dst_type)
        } else {
            dst_type.clone()
        };
        let done = |value: &str| {
            if fallible {
                format!("\treturn {}, nil\n", value)
            } else {
                format!("\treturn {}\n", value)
            }
        };

        let _ = writeln!(
            code,
            "func ({} *{}) {}({} {}) {} {{",
            RECEIVER, receiver, method.name, src_name, src_type, ret
        );

        let dst_pointer = dst_type.starts_with('*');
        if dst_pointer {
            if src_type.starts_with('*') {
                let _ = writeln!(code, "\tif {} == nil {{", src_name);
                code.push('\t');
                code.push_str(&done("nil"));
                code.push_str("\t}\n");
            }
            let _ = writeln!(code, "\t{} := &{}{{}}", DST, dst_type.trim_start_matches('*'));
        } else {
            let _ = writeln!(code, "\tvar {} {}", DST, dst_type);
            if src_type.starts_with('*') {
                let _ = writeln!(code, "\tif {} == nil {{", src_name);
                code.push('\t');
                code.push_str(&done(DST));
                code.push_str("\t}\n");
            }
        }

        for mapping in method.annotations.iter().filter(|a| a.is(MAPPING)) {
            let target = mapping.param("target").ok_or_else(|| {
                AnnogenError::generator(
                    self.name(),
                    format!(
                        "@Mapping on {}.{} needs a target parameter",
                        self.decl.name, method.name
                    ),
                )
            })?;
            let source = mapping.param("source").unwrap_or(target);
            let _ = writeln!(code, "\t{}.{} = {}.{}", DST, target, src_name, source);
        }

        code.push_str(&done(DST));
        code.push_str("}\n\n");
        Ok(src_name)
    }

    fn bad_signature(&self, method: &MethodSpec) -> AnnogenError {
        AnnogenError::generator(
            self.name(),
            format!(
                "{}.{} must take exactly one argument and return a value and an optional error",
                self.decl.name, method.name
            ),
        )
    }
}

impl Generator for MapperGenerator {
    fn name(&self) -> &str {
        "MapperGenerator"
    }

    fn generate(&self, ctx: &mut GenerationContext<'_>) -> Result<Fragment> {
        let info = TypeInfo::new(&self.decl.name, self.decl.type_params.as_deref());
        let receiver = info.derived_instance(&self.struct_name);

        let mut code = String::new();
        let _ = writeln!(code, "type {} struct{{}}\n", info.declare(&self.struct_name));
        if info.params.is_empty() {
            let _ = writeln!(
                code,
                "var _ {} = (*{})(nil)\n",
                self.decl.name, self.struct_name
            );
        }

        let mut bindings = vec![RECEIVER.to_string(), DST.to_string()];
        for method in &self.decl.methods {
            bindings.push(self.method(ctx, &receiver, method, &mut code)?);
        }
        Ok(Fragment::new(code).with_bindings(bindings))
    }
}
