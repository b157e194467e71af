//! Step tests over a temporary repository with fake process and HTTP seams.

use super::*;
use crate::catalog::{BuildCatalog, ConfigId};
use crate::config::{BuildSettings, BundleConfiguration};
use crate::constants::EXTENSIONS_JSON_FILE;
use crate::deps::DiffMode;
use crate::fs::write_file;
use crate::pack::{ArchiveOptions, archive_entries, zip_directory};
use crate::testing::{FakeHttp, FakeRunner};
use tempfile::TempDir;

//--------------------------------------------------------------------------------------------------
// Fixtures
//--------------------------------------------------------------------------------------------------

const TEMPLATES_URL: &str = "https://functionscdn.azureedge.net/public/ExtensionBundleTemplates/ExtensionBundle.v4.Templates.4.0.1.zip";

struct Fixture {
    _dir: TempDir,
    ctx: BuildContext,
    runner: FakeRunner,
    http: FakeHttp,
}

fn fixture(host: HostPlatform) -> Fixture {
    let dir = TempDir::new().unwrap();
    let settings = BuildSettings::new(dir.path());
    let bundle = BundleConfiguration {
        bundle_id: "Test.Bundle".into(),
        bundle_version: "4.2.0".into(),
        template_version: "4.0.1".into(),
        dependency_policy: DiffMode::Exact,
        index_endpoints: vec!["https://cdn.example".into()],
        reviewers: vec!["@owners".into()],
        package_feed: "https://feed".into(),
    };

    write_file(
        &settings.extensions_json(),
        r#"[
            { "id": "Ext.Storage", "name": "Storage", "majorVersion": 5, "bindings": ["blob"] },
            { "id": "Ext.Http", "name": "Http", "version": "3.2.0", "majorVersion": 3, "bindings": ["httpTrigger"] }
        ]"#,
    )
    .unwrap();
    write_file(&settings.source_project("extensions.csproj"), "<Project/>").unwrap();
    write_file(
        &settings.source_project("extensions.readytorun.csproj"),
        "<Project ReadyToRun=\"true\"/>",
    )
    .unwrap();

    let runner = FakeRunner::new();
    let http = FakeHttp::new();
    http.serve(
        "https://feed/ext.storage/index.json",
        200,
        br#"{ "versions": ["5.0.0", "5.3.0", "6.0.0-preview"] }"#.to_vec(),
    );

    let ctx = BuildContext::new(
        settings,
        bundle,
        BuildCatalog::for_host(host).unwrap(),
        Box::new(runner.clone()),
        Box::new(http.clone()),
    );

    Fixture {
        _dir: dir,
        ctx,
        runner,
        http,
    }
}

fn templates_zip(root: &Path, with_templates_json: bool) -> Vec<u8> {
    let src = root.join("template-src");
    write_file(&src.join("v1/resources/Resources.json"), "{}").unwrap();
    write_file(&src.join("v1/bindings/bindings.json"), "{}").unwrap();
    if with_templates_json {
        write_file(&src.join("v1/templates/templates.json"), "[]").unwrap();
    }
    let zip = root.join("template.zip");
    zip_directory(&src, &zip, &ArchiveOptions::default()).unwrap();
    std::fs::read(zip).unwrap()
}

/// Make `dotnet publish` drop a binary and an extensions.json into `<-o>/bin`.
fn publish_creates_output(runner: &FakeRunner) {
    runner.on("publish", |args, _| {
        let out = args
            .iter()
            .position(|a| a == "-o")
            .map(|i| PathBuf::from(&args[i + 1]))
            .unwrap();
        write_file(&out.join("bin/Ext.Storage.dll"), "dll").unwrap();
        write_file(
            &out.join("bin").join(EXTENSIONS_JSON_FILE),
            r#"{ "extensions": [ { "name": "Storage", "typeName": "S" } ] }"#,
        )
        .unwrap();
    });
}

fn deps_manifest(files: &[(&str, &str)]) -> String {
    let libraries: Vec<String> = files
        .iter()
        .map(|(path, version)| {
            format!(
                r#"{{ "name": "{path}", "runtimeAssemblyGroups": [ {{ "runtime": null, "runtimeFiles": [
                    {{ "path": "lib/net6.0/{path}", "assemblyVersion": "{version}", "fileVersion": "{version}" }}
                ] }} ] }}"#
            )
        })
        .collect();
    format!(r#"{{ "runtimeLibraries": [{}] }}"#, libraries.join(","))
}

fn write_deps(ctx: &BuildContext, id: ConfigId, baseline: &[(&str, &str)], current: &[(&str, &str)]) {
    write_file(&ctx.settings.baseline_manifest(id), deps_manifest(baseline)).unwrap();
    let config = ctx.catalog.get(id).unwrap();
    write_file(
        &config
            .publish_bin_directory(&ctx.settings.bin_dir)
            .join(DEPS_MANIFEST_FILE),
        deps_manifest(current),
    )
    .unwrap();
}

//--------------------------------------------------------------------------------------------------
// Tests: Directories & Inputs
//--------------------------------------------------------------------------------------------------

#[test]
fn test_clean_and_create_directories() {
    let mut f = fixture(HostPlatform::Linux);
    write_file(&f.ctx.settings.build_dir.join("stale.txt"), "x").unwrap();
    write_file(&f.ctx.settings.tools_dir.join("cached.zip"), "x").unwrap();

    clean(&mut f.ctx).unwrap();
    assert!(!f.ctx.settings.build_dir.exists());
    assert!(f.ctx.settings.tools_dir.join("cached.zip").exists());

    create_directories(&mut f.ctx).unwrap();
    assert!(f.ctx.settings.bin_dir.is_dir());
    assert!(f.ctx.settings.artifacts_dir.is_dir());

    clean_tools(&mut f.ctx).unwrap();
    assert!(!f.ctx.settings.tools_dir.exists());
}

#[test]
fn test_download_templates_extracts_and_copies_resources() {
    let mut f = fixture(HostPlatform::Linux);
    let body = templates_zip(&f.ctx.settings.root, true);
    f.http.serve(TEMPLATES_URL, 200, body);

    download_templates(&mut f.ctx).unwrap();

    let templates = f.ctx.settings.templates_dir();
    assert!(templates.join(TEMPLATES_JSON_PATH).is_file());
    assert!(templates.join(RESOURCES_EN_US_PATH).is_file());

    // Local builds reuse the cached archive.
    download_templates(&mut f.ctx).unwrap();
    assert_eq!(
        f.http
            .requests()
            .iter()
            .filter(|u| u.as_str() == TEMPLATES_URL)
            .count(),
        1
    );
}

#[test]
fn test_download_templates_in_ci_always_downloads() {
    let mut f = fixture(HostPlatform::Linux);
    f.ctx.settings.is_ci = true;
    let body = templates_zip(&f.ctx.settings.root, true);
    f.http.serve(TEMPLATES_URL, 200, body);

    download_templates(&mut f.ctx).unwrap();
    download_templates(&mut f.ctx).unwrap();

    assert_eq!(f.http.requests().len(), 2);
    assert!(!f.ctx.settings.tools_dir.exists());
}

#[test]
fn test_download_templates_in_ci_removes_scratch_on_failure() {
    let mut f = fixture(HostPlatform::Linux);
    f.ctx.settings.is_ci = true;
    f.ctx.settings.scratch_dir = f.ctx.settings.root.join("scratch");
    f.http.serve(TEMPLATES_URL, 200, b"not a zip".to_vec());

    assert!(download_templates(&mut f.ctx).is_err());

    let leftover = std::fs::read_dir(&f.ctx.settings.scratch_dir)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftover, 0);
}

#[test]
fn test_download_templates_failure() {
    let mut f = fixture(HostPlatform::Linux);
    let err = download_templates(&mut f.ctx).unwrap_err();
    assert!(matches!(err, BuildError::DownloadFailure { status: 404, .. }));
}

#[test]
fn test_download_templates_requires_template_list() {
    let mut f = fixture(HostPlatform::Linux);
    let body = templates_zip(&f.ctx.settings.root, false);
    f.http.serve(TEMPLATES_URL, 200, body);

    let err = download_templates(&mut f.ctx).unwrap_err();
    assert!(matches!(err, BuildError::MissingArtifact(ref p) if p.ends_with("templates.json")));
}

#[test]
fn test_generate_projects_pins_versions() {
    let mut f = fixture(HostPlatform::Linux);

    generate_projects(&mut f.ctx).unwrap();

    let versions: Vec<_> = f
        .ctx
        .resolved_extensions
        .iter()
        .map(|e| e.version.clone().unwrap())
        .collect();
    assert_eq!(versions, vec!["5.3.0", "3.2.0"]);

    let aot = f.ctx.settings.project_dir(ConfigId::LinuxX64).join(GENERATED_PROJECT_FILE);
    assert_eq!(
        std::fs::read_to_string(aot).unwrap(),
        "<Project ReadyToRun=\"true\"/>"
    );
    assert!(
        f.ctx
            .settings
            .project_dir(ConfigId::AnyAny)
            .join(GENERATED_PROJECT_FILE)
            .is_file()
    );
}

#[test]
fn test_add_packages_per_configuration() {
    let mut f = fixture(HostPlatform::Linux);
    generate_projects(&mut f.ctx).unwrap();

    add_packages(&mut f.ctx).unwrap();

    let calls = f.runner.calls();
    assert_eq!(calls.len(), 4);
    assert!(calls.iter().all(|c| c.starts_with("dotnet add ")));
    assert!(
        calls
            .iter()
            .any(|c| c.contains("any_any") && c.ends_with("package Ext.Storage -v 5.3.0 -n"))
    );
    assert!(
        calls
            .iter()
            .any(|c| c.contains("linux_x64") && c.ends_with("package Ext.Http -v 3.2.0 -n"))
    );
}

#[test]
fn test_add_packages_requires_generated_project() {
    let mut f = fixture(HostPlatform::Linux);
    let err = add_packages(&mut f.ctx).unwrap_err();
    assert!(matches!(err, BuildError::MissingArtifact(_)));
}

//--------------------------------------------------------------------------------------------------
// Tests: Build
//--------------------------------------------------------------------------------------------------

#[test]
fn test_build_binaries_copies_publish_output() {
    let mut f = fixture(HostPlatform::Linux);
    f.ctx.settings.passthrough = vec!["--no-restore".into()];
    generate_projects(&mut f.ctx).unwrap();
    publish_creates_output(&f.runner);

    build_binaries(&mut f.ctx).unwrap();

    let aot = f.ctx.catalog.get(ConfigId::LinuxX64).unwrap();
    assert!(
        aot.publish_bin_directory(&f.ctx.settings.bin_dir)
            .join("Ext.Storage.dll")
            .is_file()
    );

    let calls = f.runner.calls();
    let any_call = calls.iter().find(|c| c.contains("any_any")).unwrap();
    let aot_call = calls.iter().find(|c| c.contains("linux_x64")).unwrap();
    assert!(!any_call.contains(" -r "));
    assert!(any_call.ends_with("--no-restore"));
    assert!(aot_call.contains("-r linux-x64 --self-contained false -p:PublishReadyToRun=true --no-restore"));
}

#[test]
fn test_build_binaries_missing_output() {
    let mut f = fixture(HostPlatform::Linux);
    generate_projects(&mut f.ctx).unwrap();

    let err = build_binaries(&mut f.ctx).unwrap_err();
    assert!(matches!(err, BuildError::MissingArtifact(ref p) if p.ends_with("publish/bin")));
}

#[test]
fn test_build_binaries_tool_failure() {
    let mut f = fixture(HostPlatform::Linux);
    generate_projects(&mut f.ctx).unwrap();
    f.runner.respond("publish", 1, "", "error NU1101");

    let err = build_binaries(&mut f.ctx).unwrap_err();
    assert!(matches!(
        err,
        BuildError::ExternalToolFailure { exit_code: 1, ref stderr, .. } if stderr == "error NU1101"
    ));
}

//--------------------------------------------------------------------------------------------------
// Tests: Validation
//--------------------------------------------------------------------------------------------------

#[test]
fn test_validate_dependencies_clean() {
    let mut f = fixture(HostPlatform::Linux);
    let files = [("a.dll", "1.0.0.0"), ("b.dll", "2.0.0.0")];
    write_deps(&f.ctx, ConfigId::AnyAny, &files, &files);
    write_deps(&f.ctx, ConfigId::LinuxX64, &files, &files);

    validate_dependencies(&mut f.ctx).unwrap();
}

#[test]
fn test_validate_dependencies_reports_every_configuration() {
    let mut f = fixture(HostPlatform::Linux);
    write_deps(
        &f.ctx,
        ConfigId::AnyAny,
        &[("a.dll", "1.0.0.0"), ("b.dll", "2.0.0.0")],
        &[("a.dll", "1.0.0.0"), ("c.dll", "1.0.0.0")],
    );
    write_deps(
        &f.ctx,
        ConfigId::LinuxX64,
        &[("a.dll", "1.0.0.0")],
        &[("a.dll", "1.0.0.1")],
    );

    let err = validate_dependencies(&mut f.ctx).unwrap_err();
    match err {
        BuildError::DriftDetected { label, report } => {
            assert_eq!(label, "any_any, linux_x64");
            assert!(report.contains("Removed:"));
            assert!(report.contains("Added:"));
            assert!(report.contains("Changed:"));
            assert!(report.contains("@owners"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_validate_dependencies_major_policy() {
    let mut f = fixture(HostPlatform::Linux);
    f.ctx.bundle.dependency_policy = DiffMode::Major;
    write_deps(&f.ctx, ConfigId::AnyAny, &[("a.dll", "3.2.0")], &[("a.dll", "3.9.0")]);
    write_deps(&f.ctx, ConfigId::LinuxX64, &[("a.dll", "3.2.0")], &[("a.dll", "3.2.0")]);

    validate_dependencies(&mut f.ctx).unwrap();
}

#[test]
fn test_validate_dependencies_missing_baseline() {
    let mut f = fixture(HostPlatform::MacOs);
    let err = validate_dependencies(&mut f.ctx).unwrap_err();
    assert!(matches!(err, BuildError::ManifestNotFound(ref p) if p.ends_with("any_any.deps.json")));
}

#[test]
fn test_validate_extensions_flags_major_change() {
    let mut f = fixture(HostPlatform::Linux);
    write_file(
        &f.ctx.settings.extension_baseline(),
        r#"[
            { "id": "Ext.Storage", "name": "Storage", "majorVersion": 4 },
            { "id": "Ext.Http", "name": "Http", "majorVersion": 3 }
        ]"#,
    )
    .unwrap();

    let err = validate_extensions(&mut f.ctx).unwrap_err();
    assert!(matches!(
        err,
        BuildError::DriftDetected { ref report, .. } if report.contains("Ext.Storage: 4 -> 5")
    ));
}

#[test]
fn test_parse_vulnerable_packages() {
    let output = "\
The following sources were used:
   https://api.nuget.org/v3/index.json

Project `extensions` has the following vulnerable packages
   [net6.0]:
   Top-level Package      Requested   Resolved   Severity   Advisory URL
   > Bad.Package          1.0.0       1.0.0      High       https://github.com/advisories/1

   Transitive Package     Resolved   Severity   Advisory URL
   > Worse.Package        2.1.0      Critical   https://github.com/advisories/2
";
    let packages = parse_vulnerable_packages(output);
    assert_eq!(packages.len(), 2);
    assert!(packages[0].starts_with("Bad.Package"));
    assert!(packages[1].starts_with("Worse.Package"));

    assert!(parse_vulnerable_packages("Project `extensions` has no vulnerable packages given the current sources.").is_empty());
}

#[test]
fn test_scan_vulnerabilities_fails_on_findings() {
    let mut f = fixture(HostPlatform::MacOs);
    generate_projects(&mut f.ctx).unwrap();
    f.runner.respond(
        "--vulnerable",
        0,
        "Project `extensions` has the following vulnerable packages\n   > Bad.Package 1.0.0 1.0.0 High https://x\n",
        "",
    );

    let err = scan_vulnerabilities(&mut f.ctx).unwrap_err();
    match err {
        BuildError::VulnerabilityFound { project, packages } => {
            assert!(project.ends_with("any_any/extensions.csproj"));
            assert_eq!(packages.len(), 1);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_scan_vulnerabilities_clean() {
    let mut f = fixture(HostPlatform::Linux);
    generate_projects(&mut f.ctx).unwrap();

    scan_vulnerabilities(&mut f.ctx).unwrap();
    assert_eq!(f.runner.calls().len(), 2);
}

//--------------------------------------------------------------------------------------------------
// Tests: Packaging
//--------------------------------------------------------------------------------------------------

fn prepare_published_bundle(f: &mut Fixture) {
    let body = templates_zip(&f.ctx.settings.root, true);
    f.http.serve(TEMPLATES_URL, 200, body);
    download_templates(&mut f.ctx).unwrap();
    generate_projects(&mut f.ctx).unwrap();
    publish_creates_output(&f.runner);
    build_binaries(&mut f.ctx).unwrap();
}

#[test]
fn test_stage_and_archive_bundles() {
    let mut f = fixture(HostPlatform::Linux);
    prepare_published_bundle(&mut f);

    stage_bundles(&mut f.ctx).unwrap();
    archive_bundles(&mut f.ctx).unwrap();

    assert_eq!(f.ctx.staged_bundles.len(), 1);
    assert_eq!(f.ctx.archives.len(), 1);
    let archive = &f.ctx.archives[0].output_path;
    assert!(archive.ends_with("Test.Bundle.4.2.0_linux-x64.zip"));

    let entries = archive_entries(archive).unwrap();
    assert!(entries.contains(&"bin/Ext.Storage.dll".to_string()));
    assert!(entries.contains(&"bin_v3/linux-x64/Ext.Storage.dll".to_string()));
    assert!(entries.contains(&"StaticContent/v1/resources/Resources.en-US.json".to_string()));
}

#[test]
fn test_generate_manifest_skips_without_url() {
    let mut f = fixture(HostPlatform::Linux);
    generate_manifest(&mut f.ctx).unwrap();
    assert!(f.runner.calls().is_empty());
    assert!(f.http.requests().is_empty());
}

#[test]
fn test_generate_manifest_downloads_tool_once() {
    let mut f = fixture(HostPlatform::Linux);
    prepare_published_bundle(&mut f);
    stage_bundles(&mut f.ctx).unwrap();

    let tool_src = f.ctx.settings.root.join("tool-src");
    write_file(&tool_src.join(MANIFEST_TOOL_DLL), "tool").unwrap();
    let tool_zip = f.ctx.settings.root.join("tool.zip");
    zip_directory(&tool_src, &tool_zip, &ArchiveOptions::default()).unwrap();
    f.http.serve("https://blob/tool.zip?sig=x", 200, std::fs::read(tool_zip).unwrap());
    f.ctx.settings.manifest_tool_url = Some("https://blob/tool.zip?sig=x".into());

    generate_manifest(&mut f.ctx).unwrap();
    generate_manifest(&mut f.ctx).unwrap();

    let tool_requests = f
        .http
        .requests()
        .iter()
        .filter(|u| u.starts_with("https://blob/"))
        .count();
    assert_eq!(tool_requests, 1);
    let generate_calls = f
        .runner
        .calls()
        .iter()
        .filter(|c| c.contains(" generate -BuildDropPath "))
        .count();
    assert_eq!(generate_calls, 2);
}

#[test]
fn test_create_cdn_package_requires_archives() {
    let mut f = fixture(HostPlatform::Linux);
    let err = create_cdn_package(&mut f.ctx).unwrap_err();
    assert!(matches!(err, BuildError::MissingArtifact(_)));
}

#[test]
fn test_create_cdn_package_after_archiving() {
    let mut f = fixture(HostPlatform::Linux);
    prepare_published_bundle(&mut f);
    stage_bundles(&mut f.ctx).unwrap();
    archive_bundles(&mut f.ctx).unwrap();

    create_cdn_package(&mut f.ctx).unwrap();

    assert_eq!(f.ctx.archives.len(), 2);
    assert!(
        f.ctx.archives[1]
            .output_path
            .ends_with("cdn.example_Test.Bundle.zip")
    );
}

#[test]
fn test_create_ru_package_skips_off_windows() {
    let mut f = fixture(HostPlatform::Linux);
    create_ru_package(&mut f.ctx).unwrap();
    assert!(f.ctx.archives.is_empty());
}

#[test]
fn test_create_ru_package_on_windows() {
    let mut f = fixture(HostPlatform::Windows);
    prepare_published_bundle(&mut f);
    stage_bundles(&mut f.ctx).unwrap();
    archive_bundles(&mut f.ctx).unwrap();

    create_ru_package(&mut f.ctx).unwrap();

    let last = f.ctx.archives.last().unwrap();
    assert!(last.output_path.ends_with("Test.Bundle.4.2.0_RU_package.zip"));
    let entries = archive_entries(&last.output_path).unwrap();
    assert!(entries.contains(&"Test.Bundle/4.2.0/bundle.json".to_string()));
}
