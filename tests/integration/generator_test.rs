use service_template::generator::{Generator, GeneratorError, GeneratorInput};
use std::{fs, path::Path};
use tempfile::TempDir;

const ROUTES: &str = "// routes\n";
const APP_STATE: &str = "// app state\n";

fn scaffold() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src/services")).unwrap();
    fs::create_dir_all(dir.path().join("src/routes")).unwrap();
    fs::write(dir.path().join("src/routes/mod.rs"), ROUTES).unwrap();
    fs::write(dir.path().join("src/app_state.rs"), APP_STATE).unwrap();
    dir
}

fn generator(entity: &str) -> Generator {
    Generator::new(GeneratorInput::new("crate", entity, None)).unwrap()
}

fn read(root: &Path, relative: &str) -> String {
    fs::read_to_string(root.join(relative)).unwrap()
}

#[test]
fn test_generate_creates_files_and_appends_snippets() {
    let dir = scaffold();

    let files = generator("User").generate(dir.path()).unwrap();

    assert_eq!(files.service, dir.path().join("src/services/user_service.rs"));
    assert!(read(dir.path(), "src/services/user_service.rs").contains("pub struct UserService"));
    assert!(read(dir.path(), "src/routes/user.rs").contains("pub async fn get_by_id"));

    let routes = read(dir.path(), "src/routes/mod.rs");
    assert!(routes.starts_with(ROUTES));
    assert!(routes.contains("fn user_routes() -> Router<AppState>"));

    let app_state = read(dir.path(), "src/app_state.rs");
    assert!(app_state.starts_with(APP_STATE));
    assert!(app_state.contains("pub fn user_service(&self)"));
}

#[test]
fn test_rerun_fails_without_touching_anything() {
    let dir = scaffold();
    generator("User").generate(dir.path()).unwrap();

    let service = read(dir.path(), "src/services/user_service.rs");
    let routes = read(dir.path(), "src/routes/mod.rs");
    let app_state = read(dir.path(), "src/app_state.rs");

    let err = generator("User").generate(dir.path()).unwrap_err();
    assert!(matches!(err, GeneratorError::AlreadyExists(_)));

    assert_eq!(read(dir.path(), "src/services/user_service.rs"), service);
    assert_eq!(read(dir.path(), "src/routes/mod.rs"), routes);
    assert_eq!(read(dir.path(), "src/app_state.rs"), app_state);
    assert_eq!(routes.matches("fn user_routes()").count(), 1);
}

#[test]
fn test_missing_append_target_aborts_before_writing() {
    let dir = scaffold();
    fs::remove_file(dir.path().join("src/app_state.rs")).unwrap();

    let err = generator("Order").generate(dir.path()).unwrap_err();

    assert!(matches!(err, GeneratorError::MissingTarget(_)));
    assert!(!dir.path().join("src/services/order_service.rs").exists());
    assert!(!dir.path().join("src/routes/order.rs").exists());
    assert_eq!(read(dir.path(), "src/routes/mod.rs"), ROUTES);
}

#[test]
fn test_second_entity_appends_alongside_the_first() {
    let dir = scaffold();
    generator("User").generate(dir.path()).unwrap();
    generator("Order").generate(dir.path()).unwrap();

    let routes = read(dir.path(), "src/routes/mod.rs");
    assert!(routes.contains("fn user_routes()"));
    assert!(routes.contains("fn order_routes()"));
    assert!(routes.contains("\"/orders/{id}\""));
}

#[test]
fn test_rendered_templates_match_snapshots() {
    let generator = generator("User");

    let service = generator.render_service().unwrap();
    insta::assert_snapshot!("user_service", service);

    let handler = generator.render_handler().unwrap();
    insta::assert_snapshot!("user_handler", handler);

    let route = generator.render_route().unwrap();
    insta::assert_snapshot!("user_route", route);

    let di = generator.render_di().unwrap();
    insta::assert_snapshot!("user_di", di);
}
