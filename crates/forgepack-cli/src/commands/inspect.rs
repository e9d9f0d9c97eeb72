use super::{block_on_local, colorize_mode, json_pretty, EXIT_SUCCESS};
use forgepack_core::{BuildEngine, Created, Forge, Forged};
use forgepack_schema::{fingerprint, RawInput};
use serde_json::{json, Value};

pub fn run(forge: &Forge, input: &RawInput, json: bool) -> Result<u8, String> {
    let created = forge.create(input).map_err(|e| e.to_string())?;
    let payload = describe(&created)?;

    if json {
        println!("{}", json_pretty(&payload)?);
    } else {
        print_human(&created);
    }

    block_on_local(created.engines.close())?.map_err(|e| e.to_string())?;
    Ok(EXIT_SUCCESS)
}

fn describe(created: &Created) -> Result<Value, String> {
    let engines = created
        .engines
        .engines()
        .into_iter()
        .map(describe_engine)
        .collect::<Result<Vec<_>, _>>()?;
    let build_order: Option<Vec<&str>> = created.engines.multi().map(|multi| {
        multi
            .graph()
            .build_order()
            .into_iter()
            .map(|i| multi.engines()[i].display_name())
            .collect()
    });
    Ok(json!({
        "multi": created.engines.is_multi(),
        "watch": created.decision.watch,
        "engines": engines,
        "buildOrder": build_order,
        "deprecations": created.deprecations,
    }))
}

fn describe_engine(engine: &BuildEngine) -> Result<Value, String> {
    let fp = fingerprint(engine.options()).map_err(|e| format!("JSON serialization failed: {e}"))?;
    Ok(json!({
        "name": engine.name(),
        "context": engine.context().display().to_string(),
        "hash": fp.hash,
        "options": engine.options(),
        "plugins": engine.applied_plugins(),
        "phases": engine.fired_phases(),
        "state": engine.state(),
    }))
}

fn print_human(created: &Created) {
    for engine in created.engines.engines() {
        let options = engine.options();
        let short = fingerprint(options).map(|f| f.short.as_str().to_owned()).unwrap_or_default();
        println!("{} ({short})", console::style(engine.display_name()).bold());
        println!("  context:  {}", engine.context().display());
        println!("  mode:     {}", colorize_mode(options.mode));
        println!("  entry:    {}", options.entry.as_deref().unwrap_or_default().join(", "));
        if let Some(path) = &options.output.path {
            println!("  output:   {}", path.display());
        }
        println!("  plugins:  {}", engine.applied_plugins().join(", "));
        if !options.dependencies.is_empty() {
            println!("  depends:  {}", options.dependencies.join(", "));
        }
    }
    if let Forged::Multi(multi) = &created.engines {
        let order: Vec<&str> = multi
            .graph()
            .build_order()
            .into_iter()
            .map(|i| multi.engines()[i].display_name())
            .collect();
        println!("build order: {}", order.join(" -> "));
    }
    println!(
        "execution: {}",
        if created.decision.watch { "watch" } else { "run once" }
    );
    for deprecation in &created.deprecations {
        println!(
            "{} [{}] {}",
            console::style("deprecation").yellow(),
            deprecation.code,
            deprecation.message
        );
    }
}
