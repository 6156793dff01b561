use super::{EXCLUDE, INIT};
use crate::common::{param_name, upper_first, TypeInfo};
use annogen_cache::{Fragment, GenerationContext, Generator, PostConstructHook};
use annogen_core::{AnnogenError, Field, NodeMeta, Result, StructDecl};
use std::collections::HashSet;
use std::fmt::Write as _;

const RESULT_VAR: &str = "returnValue";

/// The annotated struct a generator works on.
#[derive(Debug, Clone)]
pub struct StructTarget {
    pub decl: StructDecl,
    pub meta: NodeMeta,
}

impl StructTarget {
    pub fn new(decl: StructDecl, meta: NodeMeta) -> Self {
        Self { decl, meta }
    }

    fn info(&self) -> TypeInfo {
        TypeInfo::new(&self.decl.name, self.decl.type_params.as_deref())
    }

    fn included_fields(&self) -> impl Iterator<Item = &Field> {
        self.decl
            .fields
            .iter()
            .filter(|f| !f.has_annotation(EXCLUDE))
    }

    /// `key: expr` pairs for fields carrying an `@Init(value=...)`.
    fn init_values(&self, ctx: &mut GenerationContext<'_>) -> Result<Vec<(String, String)>> {
        let mut values = Vec::new();
        for field in self.included_fields() {
            let Some(init) = field.annotation(INIT) else {
                continue;
            };
            let expr = init.param("value").ok_or_else(|| {
                AnnogenError::generator(
                    "Init",
                    format!(
                        "@Init on {}.{} needs a value parameter",
                        self.decl.name,
                        field.effective_name()
                    ),
                )
            })?;
            values.push((
                field.effective_name().to_string(),
                ctx.qualify(expr, &self.meta)?,
            ));
        }
        Ok(values)
    }

    /// `(field name, parameter name, qualified type)` with distinct parameter names.
    fn params<'f>(
        &self,
        ctx: &mut GenerationContext<'_>,
        fields: impl Iterator<Item = &'f Field>,
    ) -> Result<Vec<(String, String, String)>> {
        let mut seen = HashSet::new();
        let mut params = Vec::new();
        for field in fields {
            let key = field.effective_name().to_string();
            let mut name = param_name(&key);
            let mut n = 1;
            while !seen.insert(name.clone()) || name == RESULT_VAR {
                n += 1;
                name = format!("{}{}", param_name(&key), n);
            }
            params.push((key, name, ctx.qualify(&field.type_expr, &self.meta)?));
        }
        Ok(params)
    }

    fn composite_literal(&self, info: &TypeInfo, values: &[(String, String)]) -> String {
        if values.is_empty() {
            return format!("&{}{{}}", info.instance());
        }
        let mut out = format!("&{}{{\n", info.instance());
        for (key, expr) in values {
            let _ = writeln!(out, "\t\t{}: {},", key, expr);
        }
        out.push_str("\t}");
        out
    }
}

/// Calls of post-construct hooks on `var`; returns whether any can fail.
fn hook_calls(hooks: &[PostConstructHook], var: &str) -> (String, bool) {
    let fallible = hooks.iter().any(|h| h.returns_error);
    let mut out = String::new();
    for hook in hooks {
        if hook.returns_error {
            let _ = writeln!(out, "\tif err := {}.{}(); err != nil {{", var, hook.method);
            out.push_str("\t\treturn nil, err\n\t}\n");
        } else {
            let _ = writeln!(out, "\t{}.{}()", var, hook.method);
        }
    }
    (out, fallible)
}

/// Locals every constructor-family body may declare, plus its parameters.
fn bindings<'a>(
    params: &'a [(String, String, String)],
    locals: &'a [&'a str],
) -> impl Iterator<Item = String> + 'a {
    [RESULT_VAR, "err"]
        .into_iter()
        .chain(locals.iter().copied())
        .map(str::to_string)
        .chain(params.iter().map(|(_, name, _)| name.clone()))
}

fn result_type(info: &TypeInfo, fallible: bool) -> String {
    if fallible {
        format!("(*{}, error)", info.instance())
    } else {
        format!("*{}", info.instance())
    }
}

fn return_line(var: &str, fallible: bool) -> String {
    if fallible {
        format!("\treturn {}, nil\n", var)
    } else {
        format!("\treturn {}\n", var)
    }
}

/// `func NewX(<one parameter per field>) *X`
pub struct ConstructorGenerator {
    func_name: String,
    target: StructTarget,
}

impl ConstructorGenerator {
    pub fn new(func_name: impl Into<String>, target: StructTarget) -> Self {
        Self {
            func_name: func_name.into(),
            target,
        }
    }
}

impl Generator for ConstructorGenerator {
    fn name(&self) -> &str {
        "ConstructorGenerator"
    }

    fn generate(&self, ctx: &mut GenerationContext<'_>) -> Result<Fragment> {
        let target = &self.target;
        let info = target.info();
        let mut values = target.init_values(ctx)?;
        let params = target.params(
            ctx,
            target
                .included_fields()
                .filter(|f| !f.has_annotation(INIT)),
        )?;
        let (hooks, fallible) = hook_calls(ctx.hooks_for(&target.decl.name), RESULT_VAR);

        values.splice(
            0..0,
            params
                .iter()
                .map(|(key, name, _)| (key.clone(), name.clone())),
        );
        let signature = params
            .iter()
            .map(|(_, name, ty)| format!("{} {}", name, ty))
            .collect::<Vec<_>>()
            .join(", ");

        let mut code = String::new();
        let _ = writeln!(
            code,
            "func {}({}) {} {{",
            info.declare(&self.func_name),
            signature,
            result_type(&info, fallible)
        );
        let _ = writeln!(
            code,
            "\t{} := {}",
            RESULT_VAR,
            target.composite_literal(&info, &values)
        );
        code.push_str(&hooks);
        code.push_str(&return_line(RESULT_VAR, fallible));
        code.push_str("}\n");
        Ok(Fragment::new(code).with_bindings(bindings(&params, &[])))
    }
}

/// Functional options: `type XOption func(*X)` plus one setter per field.
pub struct OptionalGenerator {
    func_name: String,
    target: StructTarget,
}

impl OptionalGenerator {
    pub fn new(func_name: impl Into<String>, target: StructTarget) -> Self {
        Self {
            func_name: func_name.into(),
            target,
        }
    }
}

impl Generator for OptionalGenerator {
    fn name(&self) -> &str {
        "OptionalGenerator"
    }

    fn generate(&self, ctx: &mut GenerationContext<'_>) -> Result<Fragment> {
        let target = &self.target;
        let info = target.info();
        let option = format!("{}Option", info.name);
        let option_type = info.derived_instance(&option);
        let values = target.init_values(ctx)?;
        let params = target.params(ctx, target.included_fields())?;
        let (hooks, fallible) = hook_calls(ctx.hooks_for(&target.decl.name), RESULT_VAR);

        let mut code = String::new();
        let _ = writeln!(
            code,
            "type {} func(*{})\n",
            info.declare(&option),
            info.instance()
        );

        for (key, name, ty) in &params {
            let setter = format!("{}With{}", info.name, upper_first(key));
            let _ = writeln!(
                code,
                "func {}({} {}) {} {{",
                info.declare(&setter),
                name,
                ty,
                option_type
            );
            let _ = writeln!(code, "\treturn func(o *{}) {{", info.instance());
            let _ = writeln!(code, "\t\to.{} = {}", key, name);
            code.push_str("\t}\n}\n\n");
        }

        let _ = writeln!(
            code,
            "func {}(opts ...{}) {} {{",
            info.declare(&self.func_name),
            option_type,
            result_type(&info, fallible)
        );
        let _ = writeln!(
            code,
            "\t{} := {}",
            RESULT_VAR,
            target.composite_literal(&info, &values)
        );
        code.push_str("\tfor _, opt := range opts {\n");
        let _ = writeln!(code, "\t\topt({})", RESULT_VAR);
        code.push_str("\t}\n");
        code.push_str(&hooks);
        code.push_str(&return_line(RESULT_VAR, fallible));
        code.push_str("}\n");
        Ok(Fragment::new(code).with_bindings(bindings(&params, &["o", "opts", "opt"])))
    }
}

/// `XBuilder` with one chained setter per field and `Build()`.
pub struct BuilderGenerator {
    builder_name: String,
    target: StructTarget,
}

impl BuilderGenerator {
    pub fn new(builder_name: impl Into<String>, target: StructTarget) -> Self {
        Self {
            builder_name: builder_name.into(),
            target,
        }
    }
}

impl Generator for BuilderGenerator {
    fn name(&self) -> &str {
        "BuilderGenerator"
    }

    fn generate(&self, ctx: &mut GenerationContext<'_>) -> Result<Fragment> {
        let target = &self.target;
        let info = target.info();
        let builder = info.derived_instance(&self.builder_name);
        let values = target.init_values(ctx)?;
        let params = target.params(ctx, target.included_fields())?;
        let (hooks, fallible) = hook_calls(ctx.hooks_for(&target.decl.name), RESULT_VAR);

        let mut code = String::new();
        let _ = writeln!(code, "type {} struct {{", info.declare(&self.builder_name));
        let _ = writeln!(code, "\ttarget *{}", info.instance());
        code.push_str("}\n\n");

        let _ = writeln!(
            code,
            "func {}() *{} {{",
            info.declare(&format!("New{}", self.builder_name)),
            builder
        );
        let _ = writeln!(
            code,
            "\treturn &{}{{target: {}}}",
            builder,
            target.composite_literal(&info, &values)
        );
        code.push_str("}\n\n");

        for (key, name, ty) in &params {
            let _ = writeln!(
                code,
                "func (b *{}) {}({} {}) *{} {{",
                builder,
                upper_first(key),
                name,
                ty,
                builder
            );
            let _ = writeln!(code, "\tb.target.{} = {}", key, name);
            code.push_str("\treturn b\n}\n\n");
        }

        let _ = writeln!(
            code,
            "func (b *{}) Build() {} {{",
            builder,
            result_type(&info, fallible)
        );
        let _ = writeln!(code, "\t{} := b.target", RESULT_VAR);
        code.push_str(&hooks);
        code.push_str(&return_line(RESULT_VAR, fallible));
        code.push_str("}\n");
        Ok(Fragment::new(code).with_bindings(bindings(&params, &["b"])))
    }
}
