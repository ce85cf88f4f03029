//! `annopool urls` - one annotation link per skeleton unit.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, bail};
use annopool_core::Skeleton;
use clap::Args;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

#[derive(Args, Debug, Clone)]
pub struct UrlArgs {
    /// Categories to generate links for.
    #[arg(required = true)]
    pub categories: Vec<String>,

    /// Annotation skeleton.
    ///
    /// Environment variable: `ANNOPOOL_SKELETON`
    #[arg(long, env = "ANNOPOOL_SKELETON")]
    pub skeleton: PathBuf,

    /// Base URL of the annotation front end.
    #[arg(long, default_value_t = String::from("http://localhost:3000"))]
    pub url: String,

    /// Study completion code. Without one, links are marked `oneshot=true`.
    #[arg(short, long)]
    pub prolific_code: Option<String>,

    /// Write to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Shuffle seed, for a reproducible order.
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Links for every unit of `categories`, in skeleton order.
pub fn build_urls(
    skeleton: &Skeleton,
    categories: &[String],
    base: &str,
    prolific_code: Option<&str>,
) -> anyhow::Result<Vec<String>> {
    let base = base.trim_end_matches('/');
    let suffix = match prolific_code {
        Some(code) => format!("&prolific_code={code}"),
        None => "&oneshot=true".to_string(),
    };

    let mut urls = Vec::new();
    for category in categories {
        let Some(units) = skeleton.units_in(category) else {
            bail!("category {category} is not in the skeleton");
        };
        urls.extend(units.into_iter().map(|unit| {
            format!(
                "{base}/?object_category={}&object_id={}&grasp_id={}{suffix}",
                unit.category, unit.object_id, unit.grasp_id
            )
        }));
    }
    Ok(urls)
}

pub fn run(args: UrlArgs) -> anyhow::Result<()> {
    let skeleton = Skeleton::load(&args.skeleton)
        .with_context(|| format!("loading skeleton {}", args.skeleton.display()))?;
    let mut urls = build_urls(&skeleton, &args.categories, &args.url, args.prolific_code.as_deref())?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    urls.shuffle(&mut rng);

    let mut out = String::new();
    for url in &urls {
        writeln!(out, "{url}")?;
    }
    match &args.output {
        Some(path) => {
            std::fs::write(path, out).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(count = urls.len(), path = %path.display(), "wrote annotation urls");
        }
        None => print!("{out}"),
    }
    Ok(())
}
