mod test_support;

use serde_json::json;
use test_support::{
    error_code, error_reasons, request_as, request_ok, request_ok_as, spawn_sidecar, str_field,
    temp_dir,
};

#[test]
fn two_chapter_course_goes_from_fifty_to_complete() {
    let workspace = temp_dir("coursed-progress");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let category = request_ok_as(
        &mut stdin,
        &mut reader,
        "2",
        "author",
        "categories.create",
        json!({ "name": "Databases" }),
    );
    let course = request_ok_as(
        &mut stdin,
        &mut reader,
        "3",
        "author",
        "courses.create",
        json!({ "data": {
            "title": "SQLite Internals",
            "description": "pages and b-trees",
            "imageUrl": "https://img/sqlite.png",
            "categoryId": str_field(&category, "id"),
            "price": 30
        } }),
    );
    let course_id = str_field(&course, "id");

    let mut chapters = Vec::new();
    for (i, title) in ["Pages", "B-trees"].iter().enumerate() {
        let ch = request_ok_as(
            &mut stdin,
            &mut reader,
            &format!("c{i}"),
            "author",
            "chapters.create",
            json!({ "courseId": course_id, "data": { "title": title, "description": "d" } }),
        );
        let id = str_field(&ch, "id");
        let _ = request_ok_as(
            &mut stdin,
            &mut reader,
            &format!("cp{i}"),
            "author",
            "chapters.publish",
            json!({ "chapterId": id }),
        );
        chapters.push(id);
    }

    let unpublished = request_as(
        &mut stdin,
        &mut reader,
        "buy-early",
        "learner",
        "purchases.record",
        json!({ "courseId": course_id }),
    );
    assert_eq!(error_reasons(&unpublished), vec!["course_not_published".to_string()]);

    let _ = request_ok_as(
        &mut stdin,
        &mut reader,
        "4",
        "author",
        "courses.publish",
        json!({ "courseId": course_id }),
    );

    let locked = request_as(
        &mut stdin,
        &mut reader,
        "5",
        "learner",
        "progress.mark",
        json!({ "chapterId": chapters[0], "isCompleted": true }),
    );
    assert_eq!(error_code(&locked), "forbidden");

    let _ = request_ok_as(
        &mut stdin,
        &mut reader,
        "6",
        "learner",
        "purchases.record",
        json!({ "courseId": course_id }),
    );
    let zero = request_ok_as(
        &mut stdin,
        &mut reader,
        "7",
        "learner",
        "progress.course",
        json!({ "courseId": course_id }),
    );
    assert_eq!(zero["percentage"], json!(0));

    let marked = request_ok_as(
        &mut stdin,
        &mut reader,
        "8",
        "learner",
        "progress.mark",
        json!({ "chapterId": chapters[0], "isCompleted": true }),
    );
    assert_eq!(marked["isCompleted"], json!(true));
    let half = request_ok_as(
        &mut stdin,
        &mut reader,
        "9",
        "learner",
        "progress.course",
        json!({ "courseId": course_id }),
    );
    assert_eq!(half["percentage"], json!(50));

    let dash = request_ok_as(&mut stdin, &mut reader, "10", "learner", "progress.dashboard", json!({}));
    assert_eq!(dash["inProgress"][0]["percentage"], json!(50));
    assert!(dash["completed"].as_array().expect("completed").is_empty());

    let _ = request_ok_as(
        &mut stdin,
        &mut reader,
        "11",
        "learner",
        "progress.mark",
        json!({ "chapterId": chapters[1], "isCompleted": true }),
    );
    let full = request_ok_as(
        &mut stdin,
        &mut reader,
        "12",
        "learner",
        "progress.course",
        json!({ "courseId": course_id }),
    );
    assert_eq!(full["percentage"], json!(100));

    let dash = request_ok_as(&mut stdin, &mut reader, "13", "learner", "progress.dashboard", json!({}));
    assert_eq!(str_field(&dash["completed"][0], "courseId"), course_id);
    assert!(dash["inProgress"].as_array().expect("inProgress").is_empty());

    let browse = request_ok_as(
        &mut stdin,
        &mut reader,
        "14",
        "learner",
        "courses.browse",
        json!({ "title": "sqlite" }),
    );
    assert_eq!(browse["courses"][0]["progress"], json!(100));

    let anon = request_as(
        &mut stdin,
        &mut reader,
        "15",
        "",
        "progress.dashboard",
        json!({}),
    );
    assert_eq!(error_code(&anon), "unauthenticated");

    let _ = std::fs::remove_dir_all(workspace);
}
