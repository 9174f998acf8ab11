use anyhow::Context;

use super::load_site;
use crate::RunArgs;

pub fn run(args: &RunArgs) -> Result<(), anyhow::Error> {
    let (site, base_path) = load_site(&args.config_file)?;
    let app = site.application()?;

    // Stage paths are relative to the site file.
    std::env::set_current_dir(&base_path)
        .with_context(|| format!("failed to enter {}", base_path.display()))?;

    let mut items = 0;
    for item in app.invoke(args.pipe.as_str(), None)? {
        item.with_context(|| format!("pipe '{}' failed after {} items", args.pipe, items))?;
        items += 1;
    }

    println!("Ran pipe '{}' ({} items)", args.pipe, items);

    Ok(())
}
