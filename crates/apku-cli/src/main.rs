mod console;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use apku_journal::{read_records, render_text, JournalOptions, JournalRecord};
use apku_report::{parse, ParsedReport, ReportWatcher};
use apku_runner::ExecutionOutcome;
use apku_tools::aapt::{self, Aapt, DumpKind};
use apku_tools::apkeditor::{self, InfoOptions, InfoSection};
use apku_tools::{
    adb, apktool, injectdoc, settings_path, signer, Tool, ToolCommand, ToolError, ToolSettings,
};
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::debug;

use crate::console::Console;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    name = "apku",
    version,
    about = "Front end for apktool, APKEditor, adb and the SDK packaging tools"
)]
struct Cli {
    /// Do not mirror tool output into the on-disk journal
    #[arg(long, global = true)]
    no_journal: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run an arbitrary command through the runner
    Run {
        /// Status text shown while the command runs
        #[arg(long, default_value = "Running command...")]
        label: String,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Show the APKEditor report for an APK
    Info {
        apk: String,
        /// Print the parsed report as JSON instead of text
        #[arg(long)]
        json: bool,
        /// Section to request, e.g. permissions, dex, locales (repeatable)
        #[arg(long = "section", value_parser = parse_info_section)]
        sections: Vec<InfoSection>,
        #[arg(long)]
        framework: Option<String>,
        #[arg(short, long)]
        verbose: bool,
    },
    /// Parse a saved APKEditor info dump
    Parse {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// apktool commands
    Apktool {
        #[command(subcommand)]
        cmd: ApktoolCmd,
    },
    /// APKEditor commands
    Editor {
        #[command(subcommand)]
        cmd: EditorCmd,
    },
    /// adb commands
    Adb {
        #[command(subcommand)]
        cmd: AdbCmd,
    },
    /// aapt / aapt2 inspection
    Aapt {
        /// Use aapt2 instead of aapt
        #[arg(long, global = true)]
        v2: bool,
        #[command(subcommand)]
        cmd: AaptCmd,
    },
    /// Sign an APK with apksigner
    Sign(SignArgs),
    /// Verify an APK signature with apksigner
    Verify {
        apk: String,
        #[arg(short, long)]
        verbose: bool,
        #[arg(long)]
        print_certs: bool,
    },
    /// Inject a document provider into an APK
    InjectDoc { apk: String },
    /// zipalign an APK to 4-byte boundaries
    Align { input: String, output: String },
    /// Inspect or change tool paths
    Settings {
        #[command(subcommand)]
        cmd: SettingsCmd,
    },
    /// Print the recorded output log
    Journal {
        /// Only the last N requests
        #[arg(long)]
        last: Option<usize>,
    },
}

#[derive(Subcommand)]
enum ApktoolCmd {
    /// Decode an APK into a project directory
    Decode(DecodeArgs),
    /// Build an APK from a decoded project
    Build(ApktoolBuildArgs),
    /// Install a framework APK
    InstallFramework {
        apk: String,
        #[arg(short, long)]
        tag: Option<String>,
    },
    /// List installed frameworks
    ListFrameworks,
    /// Delete every installed framework
    EmptyFrameworkDir {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Make every resource public in a resources.arsc
    Publicize { arsc: String },
    /// Print the apktool version
    Version,
}

#[derive(Args)]
struct DecodeArgs {
    apk: String,
    #[arg(short, long)]
    output: Option<String>,
    #[arg(long)]
    framework: Option<String>,
    #[arg(long)]
    api_level: Option<String>,
    #[arg(short, long)]
    jobs: Option<String>,
    #[arg(short, long)]
    force: bool,
    #[arg(long)]
    no_res: bool,
    #[arg(long)]
    no_src: bool,
    #[arg(long)]
    no_assets: bool,
    #[arg(long)]
    only_manifest: bool,
    #[arg(long)]
    no_debug_info: bool,
    #[arg(long)]
    match_original: bool,
    #[arg(long)]
    keep_broken_res: bool,
    #[arg(long)]
    only_main_classes: bool,
}

#[derive(Args)]
struct ApktoolBuildArgs {
    dir: String,
    #[arg(short, long)]
    output: Option<String>,
    #[arg(long)]
    aapt: Option<String>,
    #[arg(long)]
    framework: Option<String>,
    #[arg(short, long)]
    debug: bool,
    #[arg(long)]
    copy_original: bool,
    #[arg(short, long)]
    force: bool,
    #[arg(long)]
    no_apk: bool,
    #[arg(long)]
    no_crunch: bool,
    #[arg(long)]
    use_aapt1: bool,
    #[arg(long)]
    net_sec_conf: bool,
}

#[derive(Subcommand)]
enum EditorCmd {
    /// Decompile an APK
    Decompile {
        apk: String,
        #[arg(short, long)]
        output: Option<String>,
        /// Decode resources to XML
        #[arg(long)]
        xml: bool,
        #[arg(long)]
        load_dex: bool,
        #[arg(long)]
        dex_lib: Option<String>,
    },
    /// Build an APK from a decompiled directory
    Build {
        dir: String,
        #[arg(short, long)]
        output: Option<String>,
        #[arg(long)]
        xml: bool,
        #[arg(long)]
        dex_lib: Option<String>,
    },
    /// Merge split APKs (apks/xapk/apkm or a directory)
    Merge {
        input: String,
        #[arg(short, long)]
        output: Option<String>,
        #[arg(long)]
        res_dir: Option<String>,
        #[arg(long)]
        extract_native_libs: Option<String>,
        #[arg(long)]
        clean_meta: bool,
        #[arg(short, long)]
        force: bool,
        #[arg(long)]
        validate_modules: bool,
        #[arg(long)]
        vrd: bool,
    },
    /// Refactor obfuscated resource names
    Refactor {
        apk: String,
        #[arg(short, long)]
        output: Option<String>,
        #[arg(long)]
        public_xml: Option<String>,
        #[arg(long)]
        clean_meta: bool,
        #[arg(short, long)]
        force: bool,
        #[arg(long)]
        fix_types: bool,
    },
    /// Obfuscate resources
    Protect {
        apk: String,
        #[arg(short, long)]
        output: Option<String>,
        #[arg(long)]
        keep_type: Option<String>,
        #[arg(long)]
        dic_dir_names: Option<String>,
        #[arg(long)]
        dic_file_names: Option<String>,
        #[arg(long)]
        confuse_zip: bool,
        #[arg(short, long)]
        force: bool,
        #[arg(long)]
        skip_manifest: bool,
    },
}

#[derive(Subcommand)]
enum AdbCmd {
    /// List attached devices
    Devices,
    /// Install (or reinstall) an APK
    Install {
        #[arg(short, long)]
        serial: String,
        apk: String,
    },
    /// Uninstall a package
    Uninstall {
        #[arg(short, long)]
        serial: String,
        package: String,
    },
    /// Connect to a device over TCP/IP
    Connect { host: String, port: String },
    /// Pair with a device for wireless debugging
    Pair {
        host: String,
        port: String,
        code: String,
    },
    /// Run a shell command on a device
    Shell {
        #[arg(short, long)]
        serial: String,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Copy a file off a device
    Pull {
        #[arg(short, long)]
        serial: String,
        remote: String,
        local: String,
    },
    /// Copy an installed package's base APK off a device
    PullApk {
        #[arg(short, long)]
        serial: String,
        package: String,
        #[arg(default_value = ".")]
        dest: PathBuf,
    },
    /// Dump package manager state for a package
    Dumpsys {
        #[arg(short, long)]
        serial: String,
        package: String,
    },
}

#[derive(Subcommand)]
enum AaptCmd {
    /// badging, permissions, resources, configurations, strings or xmltree
    Dump {
        #[arg(value_parser = parse_dump_kind)]
        kind: DumpKind,
        apk: String,
        /// Asset for xmltree (defaults to AndroidManifest.xml)
        asset: Option<String>,
    },
    /// List APK contents
    List {
        apk: String,
        #[arg(short, long)]
        verbose: bool,
    },
    /// Print the tool version
    Version,
}

#[derive(Args)]
struct SignArgs {
    input: String,
    /// Output APK (defaults to <input>_signed.apk)
    #[arg(short, long)]
    out: Option<String>,
    /// Sign with the debug key, creating its keystore on first use. Also
    /// implied when no keystore is given.
    #[arg(long)]
    test_key: bool,
    /// Keystore file
    #[arg(long)]
    ks: Option<String>,
    #[arg(long, default_value = "")]
    ks_pass: String,
    #[arg(long)]
    alias: Option<String>,
    /// Key password (defaults to the keystore password)
    #[arg(long)]
    key_pass: Option<String>,
    #[arg(long)]
    no_v1: bool,
    #[arg(long)]
    no_v2: bool,
    #[arg(long)]
    no_v3: bool,
    #[arg(long)]
    v4: bool,
}

#[derive(Subcommand)]
enum SettingsCmd {
    /// Print every setting and whether its path resolves
    Show,
    /// Change one setting and save it
    Set { key: String, value: String },
    /// Print the settings file location
    Path,
}

fn parse_info_section(value: &str) -> Result<InfoSection, String> {
    InfoSection::from_name(value).ok_or_else(|| format!("unknown info section: {value}"))
}

fn parse_dump_kind(value: &str) -> Result<DumpKind, String> {
    DumpKind::parse(value).ok_or_else(|| format!("unknown dump type: {value}"))
}

#[tokio::main]
async fn main() -> CliResult<ExitCode> {
    apku_util::init_tracing("warn")?;
    let cli = Cli::parse();
    let settings = ToolSettings::load();

    let mut console = Console::start(!cli.no_journal)?;
    let result = execute(cli.cmd, &settings, &mut console).await;
    console.close().await?;
    match result {
        Ok(code) => Ok(code),
        Err(err) => {
            eprintln!("Error: {err}");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn execute(cmd: Cmd, settings: &ToolSettings, console: &mut Console) -> CliResult<ExitCode> {
    let command = match cmd {
        Cmd::Run { label, command } => ToolCommand {
            tokens: command,
            label,
        },
        Cmd::Info {
            apk,
            json,
            sections,
            framework,
            verbose,
        } => {
            let opts = InfoOptions {
                framework,
                verbose,
                sections,
                ..Default::default()
            };
            return show_info(console, settings, &apk, &opts, json).await;
        }
        Cmd::Parse { file, json } => {
            let text = std::fs::read_to_string(&file)?;
            print_report(&parse(&text), json)?;
            return Ok(ExitCode::SUCCESS);
        }
        Cmd::Apktool { cmd } => apktool_command(settings, cmd)?,
        Cmd::Editor { cmd } => editor_command(settings, cmd)?,
        Cmd::Adb { cmd } => return run_adb(console, settings, cmd).await,
        Cmd::Aapt { v2, cmd } => {
            let aapt = if v2 { Aapt::V2 } else { Aapt::V1 };
            match cmd {
                AaptCmd::Dump { kind, apk, asset } => {
                    aapt::dump(settings, aapt, kind, &apk, asset.as_deref())?
                }
                AaptCmd::List { apk, verbose } => aapt::list(settings, &apk, verbose)?,
                AaptCmd::Version => aapt::version(settings, aapt),
            }
        }
        Cmd::Sign(args) => return sign_apk(console, settings, args).await,
        Cmd::Verify {
            apk,
            verbose,
            print_certs,
        } => signer::verify(settings, &apk, verbose, print_certs)?,
        Cmd::InjectDoc { apk } => injectdoc::inject(settings, &apk)?,
        Cmd::Align { input, output } => signer::zipalign(settings, &input, &output)?,
        Cmd::Settings { cmd } => {
            settings_command(settings, cmd)?;
            return Ok(ExitCode::SUCCESS);
        }
        Cmd::Journal { last } => {
            show_journal(last)?;
            return Ok(ExitCode::SUCCESS);
        }
    };

    let outcome = console.run(command.into_request()).await?;
    Ok(exit_code(&outcome))
}

fn exit_code(outcome: &ExecutionOutcome) -> ExitCode {
    match u8::try_from(outcome.exit_status()) {
        Ok(code) => ExitCode::from(code),
        Err(_) => ExitCode::FAILURE,
    }
}

fn sign_options(args: SignArgs) -> signer::SignOptions {
    signer::SignOptions {
        output: args.out,
        keystore: args.ks.unwrap_or_default(),
        keystore_password: args.ks_pass,
        key_alias: args.alias.unwrap_or_default(),
        key_password: args.key_pass,
        v1: !args.no_v1,
        v2: !args.no_v2,
        v3: !args.no_v3,
        v4: args.v4,
    }
}

async fn sign_apk(console: &mut Console, settings: &ToolSettings, args: SignArgs) -> CliResult<ExitCode> {
    if args.input.trim().is_empty() {
        return Err(ToolError::MissingInput("an APK file to sign").into());
    }
    let input = args.input.clone();
    let test_key = args.test_key;
    let mut opts = sign_options(args);
    if test_key || opts.keystore.trim().is_empty() {
        let keystore = signer::test_keystore_path();
        if !keystore.exists() {
            if let Some(parent) = keystore.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let generate = signer::generate_test_keystore(settings, &keystore);
            let outcome = console.run(generate.into_request()).await?;
            if !outcome.is_success() {
                return Ok(exit_code(&outcome));
            }
            if !keystore.exists() {
                return Err(format!("keytool did not create {}", keystore.display()).into());
            }
        }
        eprintln!(":: using test key {}", keystore.display());
        opts.use_test_key(&keystore);
    }
    let command = signer::sign(settings, &input, &opts)?;
    let outcome = console.run(command.into_request()).await?;
    Ok(exit_code(&outcome))
}

fn apktool_command(settings: &ToolSettings, cmd: ApktoolCmd) -> CliResult<ToolCommand> {
    let default_framework = || Some(settings.path(Tool::FrameworkDir));
    let command = match cmd {
        ApktoolCmd::Decode(args) => {
            let opts = apktool::DecodeOptions {
                output: args.output,
                framework: args.framework.or_else(default_framework),
                api_level: args.api_level,
                jobs: args.jobs,
                force: args.force,
                no_resources: args.no_res,
                no_sources: args.no_src,
                no_assets: args.no_assets,
                only_manifest: args.only_manifest,
                no_debug_info: args.no_debug_info,
                match_original: args.match_original,
                keep_broken_resources: args.keep_broken_res,
                only_main_classes: args.only_main_classes,
            };
            apktool::decode(settings, &args.apk, &opts)?
        }
        ApktoolCmd::Build(args) => {
            let opts = apktool::BuildOptions {
                output: args.output,
                aapt: args.aapt,
                framework: args.framework.or_else(default_framework),
                debug: args.debug,
                copy_original: args.copy_original,
                force: args.force,
                no_apk: args.no_apk,
                no_crunch: args.no_crunch,
                use_aapt1: args.use_aapt1,
                net_sec_conf: args.net_sec_conf,
            };
            apktool::build(settings, &args.dir, &opts)?
        }
        ApktoolCmd::InstallFramework { apk, tag } => {
            apktool::install_framework(settings, &apk, tag.as_deref())?
        }
        ApktoolCmd::ListFrameworks => apktool::list_frameworks(settings),
        ApktoolCmd::EmptyFrameworkDir { yes } => {
            if !yes {
                return Err("this deletes every installed framework; pass --yes to confirm".into());
            }
            apktool::empty_framework_dir(settings)
        }
        ApktoolCmd::Publicize { arsc } => apktool::publicize_resources(settings, &arsc)?,
        ApktoolCmd::Version => apktool::version(settings),
    };
    Ok(command)
}

fn editor_command(settings: &ToolSettings, cmd: EditorCmd) -> CliResult<ToolCommand> {
    let command = match cmd {
        EditorCmd::Decompile {
            apk,
            output,
            xml,
            load_dex,
            dex_lib,
        } => apkeditor::decompile(
            settings,
            &apk,
            &apkeditor::DecompileOptions {
                output,
                to_xml: xml,
                load_dex,
                dex_lib,
            },
        )?,
        EditorCmd::Build {
            dir,
            output,
            xml,
            dex_lib,
        } => apkeditor::build(
            settings,
            &dir,
            &apkeditor::BuildOptions {
                output,
                from_xml: xml,
                dex_lib,
            },
        )?,
        EditorCmd::Merge {
            input,
            output,
            res_dir,
            extract_native_libs,
            clean_meta,
            force,
            validate_modules,
            vrd,
        } => apkeditor::merge(
            settings,
            &input,
            &apkeditor::MergeOptions {
                output,
                res_dir,
                extract_native_libs,
                clean_meta,
                force,
                validate_modules,
                vrd,
            },
        )?,
        EditorCmd::Refactor {
            apk,
            output,
            public_xml,
            clean_meta,
            force,
            fix_types,
        } => apkeditor::refactor(
            settings,
            &apk,
            &apkeditor::RefactorOptions {
                output,
                public_xml,
                clean_meta,
                force,
                fix_types,
            },
        )?,
        EditorCmd::Protect {
            apk,
            output,
            keep_type,
            dic_dir_names,
            dic_file_names,
            confuse_zip,
            force,
            skip_manifest,
        } => apkeditor::protect(
            settings,
            &apk,
            &apkeditor::ProtectOptions {
                output,
                keep_type,
                dic_dir_names,
                dic_file_names,
                confuse_zip,
                force,
                skip_manifest,
            },
        )?,
    };
    Ok(command)
}

async fn run_adb(console: &mut Console, settings: &ToolSettings, cmd: AdbCmd) -> CliResult<ExitCode> {
    let command = match cmd {
        AdbCmd::Devices => return list_devices(console, settings).await,
        AdbCmd::PullApk {
            serial,
            package,
            dest,
        } => return pull_apk(console, settings, &serial, &package, &dest).await,
        AdbCmd::Install { serial, apk } => adb::install(settings, &serial, &apk)?,
        AdbCmd::Uninstall { serial, package } => adb::uninstall(settings, &serial, &package)?,
        AdbCmd::Connect { host, port } => adb::connect(settings, &host, &port)?,
        AdbCmd::Pair { host, port, code } => adb::pair(settings, &host, &port, &code)?,
        AdbCmd::Shell { serial, command } => adb::shell(settings, &serial, &command.join(" "))?,
        AdbCmd::Pull {
            serial,
            remote,
            local,
        } => adb::pull(settings, &serial, &remote, &local)?,
        AdbCmd::Dumpsys { serial, package } => adb::dumpsys_package(settings, &serial, &package)?,
    };
    let outcome = console.run(command.into_request()).await?;
    Ok(exit_code(&outcome))
}

/// Runs `command` and returns its outcome with the output it produced.
async fn run_capturing(
    console: &mut Console,
    command: ToolCommand,
) -> CliResult<(ExecutionOutcome, String)> {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let outcome = console
        .run(command.into_request().with_sink(Arc::new(tx)))
        .await?;
    let mut output = String::new();
    while let Ok(chunk) = rx.try_recv() {
        output.push_str(&chunk);
    }
    Ok((outcome, output))
}

async fn list_devices(console: &mut Console, settings: &ToolSettings) -> CliResult<ExitCode> {
    let (outcome, output) = run_capturing(console, adb::devices(settings)).await?;
    if outcome.is_success() {
        let serials = adb::parse_adb_devices(&output);
        if serials.is_empty() {
            eprintln!(":: no online devices");
        } else {
            eprintln!(":: online: {}", serials.join(", "));
        }
    }
    Ok(exit_code(&outcome))
}

async fn pull_apk(
    console: &mut Console,
    settings: &ToolSettings,
    serial: &str,
    package: &str,
    dest: &Path,
) -> CliResult<ExitCode> {
    let lookup = adb::package_path(settings, serial, package)?;
    let (outcome, output) = run_capturing(console, lookup).await?;
    if !outcome.is_success() {
        return Ok(exit_code(&outcome));
    }
    let remote = adb::parse_package_path(&output)
        .ok_or_else(|| format!("device reported no APK path for {package}"))?;
    let local = dest.join(format!("{package}.apk"));
    let pull = adb::pull(settings, serial, &remote, &local.display().to_string())?;
    let outcome = console.run(pull.into_request()).await?;
    Ok(exit_code(&outcome))
}

async fn show_info(
    console: &mut Console,
    settings: &ToolSettings,
    apk: &str,
    opts: &InfoOptions,
    json: bool,
) -> CliResult<ExitCode> {
    let command = apkeditor::info(settings, apk, opts)?;
    let (tx, mut reports) = mpsc::unbounded_channel();
    let (watcher, task) = ReportWatcher::spawn(settings.debounce(), move |report: ParsedReport| {
        debug!(fields = report.fields.len(), "report updated");
        let _ = tx.send(report);
    });

    console.set_echo_log(!json);
    let request = command
        .into_request()
        .with_sink(Arc::new(watcher.clone()));
    let outcome = console.run(request).await;
    watcher.finish();
    task.await?;
    let outcome = outcome?;

    let mut latest = None;
    while let Ok(report) = reports.try_recv() {
        latest = Some(report);
    }
    match latest {
        Some(report) => print_report(&report, json)?,
        None if json => print_report(&ParsedReport::default(), true)?,
        None => eprintln!(":: no report output"),
    }
    Ok(exit_code(&outcome))
}

fn print_report(report: &ParsedReport, json: bool) -> CliResult<()> {
    if json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render());
    }
    Ok(())
}

fn settings_command(settings: &ToolSettings, cmd: SettingsCmd) -> CliResult<()> {
    match cmd {
        SettingsCmd::Show => {
            let checks = settings.validate();
            for (tool, path) in settings.entries() {
                let state = match checks.iter().find(|check| check.tool == tool) {
                    Some(check) if check.ok => "ok",
                    Some(_) => "missing",
                    None => "",
                };
                println!("{:<10} {path}  {state}", tool.key());
            }
            println!("{:<10} {}", "debounce_ms", settings.debounce_ms);
        }
        SettingsCmd::Set { key, value } => {
            // Start from the file so environment overrides are not persisted.
            let path = settings_path();
            let mut stored = ToolSettings::load_from(&path);
            stored.set(&key, &value)?;
            stored.save_to(&path)?;
            println!("{key} = {}", value.trim());
        }
        SettingsCmd::Path => println!("{}", settings_path().display()),
    }
    Ok(())
}

fn show_journal(last: Option<usize>) -> CliResult<()> {
    let path = JournalOptions::from_env().file_path();
    let records = match read_records(&path) {
        Ok(records) => records,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            eprintln!(":: no journal at {}", path.display());
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };
    let records = match last {
        Some(n) => last_requests(records, n),
        None => records,
    };
    print!("{}", render_text(&records));
    Ok(())
}

fn last_requests(records: Vec<JournalRecord>, n: usize) -> Vec<JournalRecord> {
    let mut ids: Vec<&str> = Vec::new();
    for record in records.iter().rev() {
        if let Some(id) = record.request_id.as_deref() {
            if !ids.contains(&id) {
                if ids.len() == n {
                    break;
                }
                ids.push(id);
            }
        }
    }
    let keep: Vec<String> = ids.into_iter().map(str::to_string).collect();
    records
        .into_iter()
        .filter(|record| {
            record
                .request_id
                .as_ref()
                .is_some_and(|id| keep.contains(id))
        })
        .collect()
}
