use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use stokt_report::{
    html, most_popular_by_grade, prepare, similarity_report, HoldCatalog, HoldId, HoldUsage,
    NormalizedRoute, ReportParams, RoleMode, Route, WallConfig,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod download;
mod render;

use download::{download_face, write_json, Credentials, FaceClient, DEFAULT_BASE_URL};
use render::{catalog_selection, render_guard, route_selection, safe_name, DrawStyle, WallCanvas};

#[derive(Parser, Debug)]
#[command(author, version, about = "Board-climbing wall hold popularity and route similarity reports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose logging
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download routes, wall configuration and wall photo for one face
    Download(DownloadArgs),
    /// Resolve every route's hold list against the wall and write routes_normalized.json
    Normalize(NormalizeArgs),
    /// Render popularity images and append route similarity to the HTML report
    Report(ReportArgs),
}

#[derive(Parser, Debug)]
struct DownloadArgs {
    /// Cookie header captured from the app
    #[arg(long)]
    cookie: String,

    /// Authorization header captured from the app
    #[arg(long)]
    auth: String,

    /// Face (wall) identifier
    #[arg(long = "face-id", alias = "faceid")]
    face_id: String,

    /// Directory the downloaded files are written to
    #[arg(long, default_value = ".", value_hint = ValueHint::DirPath)]
    data_dir: PathBuf,

    /// Service root
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,
}

#[derive(Parser, Debug)]
struct NormalizeArgs {
    /// Directory holding routes.json and wall_config.json
    #[arg(long, default_value = ".", value_hint = ValueHint::DirPath)]
    data_dir: PathBuf,

    /// Optional JSON file overriding report parameters
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Keep holds with unrecognised role characters instead of failing
    #[arg(long, action = ArgAction::SetTrue)]
    lenient_roles: bool,
}

#[derive(Parser, Debug)]
struct ReportArgs {
    /// Directory holding the downloaded files
    #[arg(long, default_value = ".", value_hint = ValueHint::DirPath)]
    data_dir: PathBuf,

    /// Directory the images and CSV are written to (defaults to the data dir)
    #[arg(long, value_hint = ValueHint::DirPath)]
    output_dir: Option<PathBuf>,

    /// HTML report the similarity section is appended to
    #[arg(long, value_hint = ValueHint::FilePath)]
    report: Option<PathBuf>,

    /// Grades for the per-grade popularity images (comma separated)
    #[arg(long)]
    grades: Option<String>,

    /// Holds shown in each per-grade image
    #[arg(long)]
    grade_top_n: Option<usize>,

    /// Also add a per-grade popularity list to the HTML report
    #[arg(long, action = ArgAction::SetTrue)]
    grade_summary: bool,

    /// Render one image per route into all_routes/
    #[arg(long, action = ArgAction::SetTrue)]
    all_routes: bool,

    /// Do not ask before rendering every route
    #[arg(short, long, action = ArgAction::SetTrue)]
    yes: bool,

    /// Optional JSON file overriding report parameters
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Keep holds with unrecognised role characters instead of failing
    #[arg(long, action = ArgAction::SetTrue)]
    lenient_roles: bool,

    /// Profile major stages with timings
    #[arg(long, action = ArgAction::SetTrue)]
    profile: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Download(args) => handle_download(args),
        Command::Normalize(args) => handle_normalize(args),
        Command::Report(args) => handle_report(args),
    }
}

fn load_params(path: Option<&Path>, lenient_roles: bool) -> Result<ReportParams> {
    let mut params = match path {
        Some(path) => read_json(path)?,
        None => ReportParams::default(),
    };
    if lenient_roles {
        params.role_mode = RoleMode::Lenient;
    }
    Ok(params)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn handle_download(args: DownloadArgs) -> Result<()> {
    let params = ReportParams::default();
    let client = FaceClient::new(
        &args.base_url,
        Credentials {
            cookie: args.cookie,
            authorization: args.auth,
        },
    )?;
    let manifest = download_face(&client, &args.face_id, &args.data_dir, &params)?;
    info!(
        "Downloaded {} routes for face {} into {}",
        manifest.routes,
        manifest.face_id,
        args.data_dir.display()
    );
    Ok(())
}

/// Load the wall and routes from `data_dir`, normalize, and persist the result.
fn load_and_normalize(
    data_dir: &Path,
    params: &ReportParams,
) -> Result<(HoldCatalog, Vec<NormalizedRoute>)> {
    let wall: WallConfig = read_json(&data_dir.join(&params.wall_config_file))?;
    let routes: Vec<Route> = read_json(&data_dir.join(&params.routes_file))?;
    let (catalog, normalized) = prepare(&wall, routes, params.role_mode)?;

    let out = data_dir.join(&params.normalized_file);
    write_json(&out, &normalized, true)?;
    info!(
        "Normalized {} routes over {} holds: {}",
        normalized.len(),
        catalog.len(),
        out.display()
    );
    Ok((catalog, normalized))
}

fn handle_normalize(args: NormalizeArgs) -> Result<()> {
    let params = load_params(args.config.as_deref(), args.lenient_roles)?;
    load_and_normalize(&args.data_dir, &params)?;
    Ok(())
}

fn handle_report(args: ReportArgs) -> Result<()> {
    let mut params = load_params(args.config.as_deref(), args.lenient_roles)?;
    if let Some(grades) = args.grades.as_deref() {
        let grades = parse_grade_list(grades);
        if grades.is_empty() {
            return Err(anyhow!("--grades list was empty"));
        }
        params.grades = grades;
    }
    if let Some(n) = args.grade_top_n {
        params.grade_top_n = n;
    }

    let output_dir = args.output_dir.clone().unwrap_or_else(|| args.data_dir.clone());
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let report_path = args
        .report
        .clone()
        .unwrap_or_else(|| args.data_dir.join(&params.report_file));

    // Refuse before doing any work if a previous run already appended its section.
    let existing_report = read_report(&report_path)?;
    html::check_report(&existing_report)?;

    let t_load = Instant::now();
    let (catalog, routes) = load_and_normalize(&args.data_dir, &params)?;
    if args.profile {
        info!(
            "Load stage: {:.1} ms",
            t_load.elapsed().as_secs_f64() * 1000.0
        );
    }

    let canvas = WallCanvas::load(
        &args.data_dir.join(&params.wall_image_file),
        params.background_alpha,
        DrawStyle {
            stroke_width: params.stroke_width,
            title_size: params.title_size,
        },
    )?;
    let (width, height) = canvas.dimensions();
    debug!("Wall image {width}x{height}");

    let t_render = Instant::now();
    let usage = HoldUsage::from_routes(&routes);
    for &n in &params.top_sizes {
        let (title, file) = top_holds_labels(n);
        render_selection(&canvas, &catalog, &usage.top(n), &title, &output_dir.join(file))?;
    }

    let by_grade = most_popular_by_grade(&routes, &params.grades, params.grade_top_n);
    let grade_word = count_word(params.grade_top_n);
    for grade in &by_grade {
        info!("{}: {} routes", grade.grade, grade.route_count);
        let ids: Vec<HoldId> = grade.holds.iter().map(|(id, _)| *id).collect();
        render_selection(
            &canvas,
            &catalog,
            &ids,
            &format!(
                "{} Most Popular Holds for Grade {}",
                capitalize(&grade_word),
                grade.grade
            ),
            &output_dir.join(format!(
                "{}_most_popular_holds_for_grade_{}.jpg",
                grade_word, grade.grade
            )),
        )?;
    }

    let unused = usage.unused(&catalog);
    info!("Unused holds: {:?}", unused);
    render_selection(
        &canvas,
        &catalog,
        &unused,
        "Unused Holds",
        &output_dir.join("unused_holds.jpg"),
    )?;

    let used_once = usage.used_exactly_once();
    info!("Holds used exactly once: {:?}", used_once);
    render_selection(
        &canvas,
        &catalog,
        &used_once,
        "Holds Used Exactly Once",
        &output_dir.join("holds_used_exactly_once.jpg"),
    )?;
    if args.profile {
        info!(
            "Render stage: {:.1} ms",
            t_render.elapsed().as_secs_f64() * 1000.0
        );
    }

    let csv_path = output_dir.join(&params.popularity_csv_file);
    write_popularity_csv(&usage, &catalog, &csv_path)?;
    info!("Wrote hold popularity CSV: {}", csv_path.display());

    let t_similarity = Instant::now();
    let messages = similarity_report(&routes);
    if args.profile {
        info!(
            "Similarity stage: {:.1} ms ({} routes)",
            t_similarity.elapsed().as_secs_f64() * 1000.0,
            routes.len()
        );
    }
    let mut report = existing_report;
    if args.grade_summary {
        report.push_str(&html::popularity_section(&by_grade));
    }
    let report = html::append_similarity(&report, &messages)?;
    fs::write(&report_path, report)
        .with_context(|| format!("failed to write {}", report_path.display()))?;
    info!(
        "Appended {} similarity lines to {}",
        messages.len(),
        report_path.display()
    );

    if args.all_routes {
        let proceed = args.yes
            || confirm(
                "Generate pictures of all routes? [Y/n] ",
                &mut io::stdin().lock(),
                &mut io::stderr(),
            )?;
        if proceed {
            render_all_routes(&canvas, &routes, &output_dir.join(&params.all_routes_dir))?;
        } else {
            info!("Skipping per-route images");
        }
    }

    Ok(())
}

fn read_report(path: &Path) -> Result<String> {
    if path.exists() {
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
    } else {
        warn!(
            "{} does not exist; starting an empty report",
            path.display()
        );
        Ok("<html><body>".to_string())
    }
}

fn render_selection(
    canvas: &WallCanvas,
    catalog: &HoldCatalog,
    ids: &[HoldId],
    title: &str,
    path: &Path,
) -> Result<()> {
    let holds = catalog_selection(catalog, ids);
    render_guard(|| canvas.render(&holds, title, path))
        .with_context(|| format!("failed to render {}", path.display()))?;
    info!("Wrote image: {}", path.display());
    Ok(())
}

/// Files written and routes skipped by one all-routes pass.
#[derive(Debug, Default, PartialEq, Eq)]
struct RouteImages {
    written: usize,
    skipped: usize,
}

fn render_all_routes(
    canvas: &WallCanvas,
    routes: &[NormalizedRoute],
    dir: &Path,
) -> Result<RouteImages> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    // Claim target files in collection order so the first route with a given
    // name wins and no two workers ever write the same path.
    let mut claimed = HashSet::new();
    let mut jobs = Vec::with_capacity(routes.len());
    let mut skipped = 0;
    for route in routes {
        let path = dir.join(format!("{}.jpg", safe_name(route.name())));
        if path.exists() {
            debug!("Skipping existing {}", path.display());
            skipped += 1;
        } else if !claimed.insert(path.clone()) {
            warn!(
                "Route {} shares {} with an earlier route; skipping",
                route.id(),
                path.display()
            );
            skipped += 1;
        } else {
            jobs.push((route, path));
        }
    }

    jobs.par_iter()
        .map(|(route, path)| -> Result<()> {
            let holds = route_selection(route);
            let by_name = render_guard(|| canvas.render(&holds, route.name(), path));
            if let Err(err) = by_name {
                let fallback = dir.join(format!("{}.jpg", route.id()));
                if claimed.contains(&fallback) {
                    bail!(
                        "rendering {} failed ({err:#}) and {} belongs to another route",
                        path.display(),
                        fallback.display()
                    );
                }
                warn!(
                    "Rendering {} failed ({err:#}); retrying as {}",
                    path.display(),
                    fallback.display()
                );
                render_guard(|| canvas.render(&holds, route.name(), &fallback))
                    .with_context(|| format!("failed to render route {}", route.id()))?;
            }
            Ok(())
        })
        .collect::<Result<Vec<_>>>()?;

    let summary = RouteImages {
        written: jobs.len(),
        skipped,
    };
    info!(
        "Wrote {} route images ({} skipped) into {}",
        summary.written,
        summary.skipped,
        dir.display()
    );
    Ok(summary)
}

fn confirm<R: BufRead, W: Write>(prompt: &str, input: &mut R, output: &mut W) -> Result<bool> {
    write!(output, "{prompt}")?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(false);
    }
    let answer = line.trim().to_ascii_lowercase();
    Ok(answer.is_empty() || answer == "y" || answer == "yes")
}

fn write_popularity_csv(usage: &HoldUsage, catalog: &HoldCatalog, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    write_popularity_rows(usage, catalog, &mut writer)
}

fn write_popularity_rows<W: Write>(
    usage: &HoldUsage,
    catalog: &HoldCatalog,
    writer: &mut csv::Writer<W>,
) -> Result<()> {
    writer.write_record(["rank", "hold_id", "count"])?;
    let ranked = usage.ranked();
    for (rank, id) in ranked.iter().enumerate() {
        writer.write_record([
            (rank + 1).to_string(),
            id.to_string(),
            usage.count(*id).to_string(),
        ])?;
    }
    for id in usage.unused(catalog) {
        writer.write_record([String::new(), id.to_string(), "0".to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

fn parse_grade_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn count_word(n: usize) -> String {
    const WORDS: [&str; 11] = [
        "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    ];
    WORDS
        .get(n)
        .map(|w| w.to_string())
        .unwrap_or_else(|| n.to_string())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Image title and file name for a "top n holds" image.
fn top_holds_labels(n: usize) -> (String, String) {
    if n == 1 {
        return (
            "Most Popular Hold".to_string(),
            "most_popular_hold.jpg".to_string(),
        );
    }
    let word = count_word(n);
    (
        format!("{} Most Popular Holds", capitalize(&word)),
        format!("{word}_most_popular_holds.jpg"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use stokt_report::Hold;

    #[test]
    fn top_labels_match_report_files() {
        assert_eq!(
            top_holds_labels(1),
            (
                "Most Popular Hold".to_string(),
                "most_popular_hold.jpg".to_string()
            )
        );
        assert_eq!(
            top_holds_labels(5),
            (
                "Five Most Popular Holds".to_string(),
                "five_most_popular_holds.jpg".to_string()
            )
        );
        assert_eq!(top_holds_labels(25).1, "25_most_popular_holds.jpg");
    }

    #[test]
    fn confirm_defaults_to_yes_on_enter() {
        let mut out = Vec::new();
        assert!(confirm("go? ", &mut "\n".as_bytes(), &mut out).unwrap());
        assert!(!confirm("go? ", &mut "n\n".as_bytes(), &mut out).unwrap());
        assert!(!confirm("go? ", &mut "".as_bytes(), &mut out).unwrap());
        assert_eq!(String::from_utf8(out).unwrap(), "go? go? go? ");
    }

    #[test]
    fn grade_list_drops_blanks() {
        assert_eq!(parse_grade_list("V1, V2,,V10 "), vec!["V1", "V2", "V10"]);
    }

    #[test]
    fn popularity_csv_lists_ranked_then_unused() {
        let wall = WallConfig {
            holds: (1..=3).map(|id| Hold::new(id, "0,0 1,1")).collect(),
            picture: None,
            extra: Default::default(),
        };
        let (catalog, routes) = prepare(
            &wall,
            vec![Route::new("r", "r", "V1", "S2 T2 O1")],
            RoleMode::Strict,
        )
        .unwrap();
        let usage = HoldUsage::from_routes(&routes);
        let mut writer = csv::Writer::from_writer(Vec::new());
        write_popularity_rows(&usage, &catalog, &mut writer).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(text, "rank,hold_id,count\n1,2,2\n2,1,1\n,3,0\n");
    }

    #[test]
    fn normalize_writes_file_next_to_inputs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("wall_config.json"),
            r#"{"holds":[{"id":1,"polygonStr":"0,0 1,1"},{"id":2,"polygonStr":"2,2 3,3"}]}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("routes.json"),
            r#"[{"id":"r1","name":"One","crowdGrade":{"hueco":"V1"},"holdsList":"S1 T2"}]"#,
        )
        .unwrap();

        let params = ReportParams::default();
        let (catalog, routes) = load_and_normalize(dir.path(), &params).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(routes[0].normalized_holds.len(), 2);

        let written: Vec<NormalizedRoute> =
            read_json(&dir.path().join("routes_normalized.json")).unwrap();
        assert_eq!(written, routes);
    }

    fn route_canvas() -> (WallCanvas, HoldCatalog) {
        let image = image::RgbImage::from_pixel(80, 80, image::Rgb([255, 255, 255]));
        let canvas = WallCanvas::from_image(
            image,
            1.0,
            DrawStyle {
                stroke_width: 5,
                title_size: 12,
            },
        );
        let catalog = HoldCatalog::from_holds(vec![
            Hold::new(1, "5,5 30,5 30,30 5,30"),
            Hold::new(2, "45,45 70,45 70,70 45,70"),
        ])
        .unwrap();
        (canvas, catalog)
    }

    fn normalized(catalog: &HoldCatalog, routes: Vec<Route>) -> Vec<NormalizedRoute> {
        stokt_report::normalize_routes(routes, catalog, RoleMode::Strict).unwrap()
    }

    fn luma(image: &image::RgbImage, x: u32, y: u32) -> u32 {
        image.get_pixel(x, y).0.iter().map(|c| *c as u32).sum::<u32>() / 3
    }

    #[test]
    fn same_named_routes_keep_the_first_image() {
        let (canvas, catalog) = route_canvas();
        let routes = normalized(
            &catalog,
            vec![
                Route::new("r0", "Dup", "V1", "O1"),
                Route::new("r1", "Dup", "V1", "O2"),
                Route::new("r2", "a/b", "V1", "O1"),
                Route::new("r3", "a$b", "V1", "O2"),
            ],
        );
        let dir = tempfile::tempdir().unwrap();

        let summary = render_all_routes(&canvas, &routes, dir.path()).unwrap();
        assert_eq!(
            summary,
            RouteImages {
                written: 2,
                skipped: 2
            }
        );

        let mut files: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        files.sort();
        assert_eq!(files, vec!["Dup.jpg", "a-b.jpg"]);

        for name in files {
            let image = image::open(dir.path().join(name)).unwrap().to_rgb8();
            assert!(luma(&image, 17, 5) < 100, "first route's hold is drawn");
            assert!(luma(&image, 57, 45) > 200, "second route's hold is not");
        }
    }

    #[test]
    fn existing_images_are_kept_and_failed_names_fall_back_to_id() {
        let (canvas, catalog) = route_canvas();
        let routes = normalized(
            &catalog,
            vec![
                Route::new("r0", "Existing", "V1", "O1"),
                Route::new("r1", "", "V1", "O2"),
            ],
        );
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("Existing.jpg");
        fs::write(&existing, b"kept").unwrap();

        let summary = render_all_routes(&canvas, &routes, dir.path()).unwrap();
        assert_eq!(
            summary,
            RouteImages {
                written: 1,
                skipped: 1
            }
        );
        assert_eq!(fs::read(&existing).unwrap(), b"kept");
        assert!(!dir.path().join(".jpg").exists());

        let image = image::open(dir.path().join("r1.jpg")).unwrap().to_rgb8();
        assert!(luma(&image, 57, 45) < 100);
        assert!(luma(&image, 17, 5) > 200);
    }

    #[test]
    fn report_guard_rejects_existing_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.html");
        fs::write(&path, "<h2>Route Similarity</h2>").unwrap();
        let existing = read_report(&path).unwrap();
        assert!(html::check_report(&existing).is_err());
        assert_eq!(
            read_report(&dir.path().join("missing.html")).unwrap(),
            "<html><body>"
        );
    }
}
