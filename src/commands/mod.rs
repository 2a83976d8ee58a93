use std::env;
use std::path::PathBuf;

use anyhow::Context as _;
use tabled::settings::Style;
use tabled::Table;

use skipper::assets::COMPLETION_SCRIPT;
use skipper::builder::{build, BuildSpec};
use skipper::docker::{delete_local_image, local_images_info};
use skipper::image::ImageRow;
use skipper::nested::{make_command, run_nested, NestedRun, DEFAULT_MAKEFILE, USE_CACHE_IMAGE_ENV};
use skipper::push::{push_image, PushRequest};
use skipper::registry::{delete_remote_image, remote_images_info};
use skipper::util::{env_flag, StdoutTarget, SystemRunner};
use skipper::{load_config, Context, ImageRef, Logger, Settings, SkipperError};

use crate::cli::{Cli, Command, ContainerOpts};

/// Run the parsed command line and return the process exit code.
pub(crate) fn dispatch(cli: Cli, logger: Logger) -> anyhow::Result<i32> {
    match &cli.command {
        Command::Version { verbose } => return Ok(run_version(*verbose)),
        Command::Completion => {
            print!("{COMPLETION_SCRIPT}");
            return Ok(0);
        }
        _ => {}
    }

    let ctx = load_context(&cli, logger)?;
    let code = match cli.command {
        Command::Build {
            images,
            container_context,
            cache,
        } => run_build(&ctx, &images, container_context, cache)?,
        Command::Push {
            namespace,
            force,
            image,
        } => run_push(&ctx, image, namespace, force)?,
        Command::Images { remote } => run_images(&ctx, remote)?,
        Command::Rmi { remote, image, tag } => run_rmi(&ctx, remote, &image, &tag)?,
        Command::Run {
            interactive,
            opts,
            command,
        } => run_nested(&ctx, nested(command, interactive, opts))?,
        Command::Make {
            interactive,
            makefile,
            opts,
            targets,
        } => {
            let makefile = makefile
                .or_else(|| ctx.settings.makefile.clone())
                .unwrap_or_else(|| DEFAULT_MAKEFILE.to_string());
            let command = make_command(&makefile, &targets);
            run_nested(&ctx, nested(command, interactive, opts))?
        }
        Command::Shell { opts } => run_nested(&ctx, nested(vec!["bash".to_string()], true, opts))?,
        Command::Version { .. } | Command::Completion => 0,
    };
    Ok(code)
}

fn load_context(cli: &Cli, logger: Logger) -> anyhow::Result<Context> {
    let cwd = env::current_dir().context("cannot determine the current directory")?;
    let path = cwd.join(&cli.config_file);
    let cfg = load_config(&path, &SystemRunner)
        .with_context(|| format!("failed to load {}", path.display()))?;
    let settings = Settings::resolve(cli.global_options(), cfg, cwd);
    Ok(Context::new(settings, logger, Box::new(SystemRunner)))
}

fn nested(command: Vec<String>, interactive: bool, opts: ContainerOpts) -> NestedRun {
    NestedRun {
        command,
        interactive,
        name: opts.name,
        env: opts.env,
        publish: opts.publish,
        use_layer_cache: opts.cache,
    }
    .with_env_toggles()
}

fn run_version(verbose: bool) -> i32 {
    println!("{}", env!("CARGO_PKG_VERSION"));
    if verbose {
        println!("build date: {}", env!("SKIPPER_BUILD_DATE"));
        println!("target:     {}", env!("SKIPPER_BUILD_TARGET"));
        println!("rustc:      {}", env!("SKIPPER_BUILD_RUSTC"));
    }
    0
}

fn run_build(
    ctx: &Context,
    requested: &[String],
    container_context: Option<String>,
    cache: bool,
) -> Result<i32, SkipperError> {
    let logger = &ctx.logger;
    let settings = &ctx.settings;
    let cache = cache || env_flag(USE_CACHE_IMAGE_ENV);
    logger.debug("executing build command");

    let project = settings.project_images(logger);
    let selected: Vec<(String, PathBuf)> = if requested.is_empty() {
        project.into_iter().collect()
    } else {
        requested
            .iter()
            .filter_map(|image| match project.get(image) {
                Some(df) => Some((image.clone(), df.clone())),
                None => {
                    logger.warn(&format!(
                        "image {image} is not valid for this project, skipping"
                    ));
                    None
                }
            })
            .collect()
    };

    let tag = ctx.revision()?;
    let runner = ctx.container_runner()?;
    for (image, dockerfile) in selected {
        logger.info(&format!("building image: {image}"));
        if !dockerfile.is_file() {
            logger.warn(&format!(
                "dockerfile {} does not exist, skipping",
                dockerfile.display()
            ));
            continue;
        }
        let context = container_context
            .clone()
            .or_else(|| settings.container_context.clone())
            .or_else(|| dockerfile.parent().map(|p| p.display().to_string()));
        let mut build_args = vec![format!("TAG={tag}")];
        build_args.extend(settings.build_args.iter().cloned());
        let target = ImageRef::new(image)?
            .with_tag(Some(tag.as_str()))
            .with_registry(settings.registry.clone())
            .with_dockerfile(dockerfile);
        let spec = BuildSpec::new(
            target,
            context,
            settings.build_contexts.clone(),
            build_args,
            cache,
        );
        let code = build(
            &spec,
            |args| runner.run_runtime(args, StdoutTarget::Inherit),
            logger,
        )?;
        if code != 0 {
            return Ok(code);
        }
    }
    Ok(0)
}

fn run_push(
    ctx: &Context,
    image: String,
    namespace: Option<String>,
    force: bool,
) -> Result<i32, SkipperError> {
    ctx.logger.debug("executing push command");
    let registry = ctx.settings.require_registry()?.to_string();
    let api = ctx.require_registry_api()?;
    let req = PushRequest {
        image,
        tag: ctx.revision()?,
        registry,
        namespace,
        force,
    };
    push_image(&req, &ctx.container_runner()?, api, &ctx.logger)
}

fn run_images(ctx: &Context, remote: bool) -> Result<i32, SkipperError> {
    ctx.logger.debug("executing images command");
    let names: Vec<String> = ctx
        .settings
        .project_images(&ctx.logger)
        .into_keys()
        .collect();
    ctx.logger
        .info(&format!("expected images: {}", names.join(", ")));
    let mut rows = local_images_info(ctx.process(), ctx.runtime()?, &names)?;
    if remote {
        let registry = ctx.settings.require_registry()?;
        rows.extend(remote_images_info(
            ctx.require_registry_api()?,
            registry,
            &names,
        )?);
    }
    println!("{}", images_table(&rows));
    Ok(0)
}

fn run_rmi(ctx: &Context, remote: bool, image: &str, tag: &str) -> Result<i32, SkipperError> {
    ctx.logger.debug("executing rmi command");
    let known: Vec<String> = ctx
        .settings
        .project_images(&ctx.logger)
        .into_keys()
        .collect();
    if !known.iter().any(|k| k == image) {
        return Err(SkipperError::UnknownProjectImage {
            image: image.to_string(),
            known,
        });
    }
    if remote {
        ctx.settings.require_registry()?;
        delete_remote_image(ctx.require_registry_api()?, image, tag)?;
        Ok(0)
    } else {
        delete_local_image(ctx.process(), ctx.runtime()?, image, tag)
    }
}

/// `REGISTRY | IMAGE | TAG` grid, one ruled line per row.
fn images_table(rows: &[ImageRow]) -> String {
    Table::new(rows.to_vec()).with(Style::ascii()).to_string()
}
