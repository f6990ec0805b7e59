use statusrelay::cli::Cli;
use statusrelay::config::{RelayConfig, RelaySettings};
use statusrelay::core::{RelayContext, Scheduler, TimeTransformer};
use statusrelay::error::{RelayError, Result};
use statusrelay::logging;
use statusrelay::plugins::{load_plugins, InjectionEngine, Plugin};
use statusrelay::utils::signals;
use statusrelay::wrapper::{find_generator, BarOutput, StatusProducer};
use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = match Cli::parse_args() {
        Ok(cli) => cli,
        Err(e) => match Cli::usage_exit_code(&e) {
            None => e.exit(),
            Some(code) => {
                let _ = e.print();
                return ExitCode::from(code);
            }
        },
    };

    let settings = match RelaySettings::resolve(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            logging::init_default();
            tracing::error!("{}", e);
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    let _guard = match logging::init(&settings.log_level, settings.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            logging::init_default();
            tracing::error!("{}", e);
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    match run(settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn run(settings: RelaySettings) -> Result<()> {
    let config = RelayConfig::load(&settings.generator_config)?;
    config
        .ensure_i3bar()
        .map_err(|message| RelayError::generator_config(&settings.generator_config, message))?;
    tracing::info!(
        "generator config {} (interval {}s)",
        settings.generator_config.display(),
        config.interval
    );

    let mut engine = InjectionEngine::new(settings.cache_timeout, settings.strict_validation);
    for plugin in load_plugins(&settings.plugin_dir, settings.plugin_timeout())? {
        tracing::info!("loaded plugin {} {:?}", plugin.id(), plugin.methods());
        engine.register(Box::new(plugin));
    }

    let generator = find_generator(settings.generator.as_deref())?;

    // Handlers go in before the generator starts so an early SIGUSR1 is caught
    let (control_tx, control_rx) = crossbeam_channel::unbounded();
    signals::install(control_tx)?;

    let mut producer = StatusProducer::for_generator(generator, &settings.generator_config);
    producer.start()?;

    let transformer = TimeTransformer::new(config.time_format.clone(), !settings.disable_transform);
    let ctx = RelayContext::new(config, transformer, engine, settings.tick());

    let stdout = io::stdout();
    let mut scheduler = Scheduler::new(
        producer,
        Some(control_rx),
        BarOutput::new(stdout.lock()),
        ctx,
    );
    scheduler.run()
}
