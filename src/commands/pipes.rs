use super::load_site;
use crate::PipesArgs;

pub fn run(args: &PipesArgs) -> Result<(), anyhow::Error> {
    let (site, _) = load_site(&args.config_file)?;

    if site.pipes.is_empty() {
        println!("No pipes defined in {}", args.config_file.display());
        return Ok(());
    }

    for (name, stages) in &site.pipes {
        let names: Vec<&str> = stages
            .iter()
            .filter_map(|stage| stage.get("name").and_then(|name| name.as_str()))
            .collect();
        println!("{name}: {}", names.join(" -> "));
    }

    Ok(())
}
