mod test_support;

use serde_json::json;
use test_support::{error_code, request_as, request_ok, request_ok_as, spawn_sidecar, str_field, temp_dir};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("coursed-router-smoke");
    let restored = temp_dir("coursed-router-smoke-restored");
    let bundle_out = workspace.join("smoke-backup.coursed.zip");

    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health["workspacePath"].is_null());
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let course = request_ok_as(
        &mut stdin,
        &mut reader,
        "3",
        "smoke",
        "courses.create",
        json!({ "data": { "title": "Smoke Course" } }),
    );
    let course_id = str_field(&course, "id");
    let post = request_ok_as(
        &mut stdin,
        &mut reader,
        "4",
        "smoke",
        "posts.create",
        json!({ "data": { "title": "Smoke Post" } }),
    );
    let post_id = str_field(&post, "id");

    let calls = vec![
        ("categories.list", json!({})),
        ("categories.create", json!({ "name": "Smoke" })),
        ("courses.update", json!({ "courseId": course_id, "patch": { "description": "d" } })),
        ("courses.publish", json!({ "courseId": course_id })),
        ("courses.list", json!({})),
        ("courses.browse", json!({})),
        ("courses.open", json!({ "courseId": course_id })),
        ("chapters.create", json!({ "courseId": course_id, "data": { "title": "Ch" } })),
        ("chapters.update", json!({ "chapterId": "missing", "patch": { "title": "x" } })),
        ("chapters.delete", json!({ "chapterId": "missing" })),
        ("chapters.publish", json!({ "chapterId": "missing" })),
        ("chapters.togglePublish", json!({ "chapterId": "missing" })),
        ("chapters.reorder", json!({ "courseId": course_id, "list": [] })),
        ("sections.create", json!({ "chapterId": "missing", "data": { "title": "S" } })),
        ("sections.update", json!({ "sectionId": "missing", "patch": {} })),
        ("sections.delete", json!({ "sectionId": "missing" })),
        ("sections.publish", json!({ "sectionId": "missing" })),
        ("sections.reorder", json!({ "chapterId": "missing", "list": [] })),
        ("items.create", json!({ "sectionId": "missing", "data": { "kind": "note", "title": "N" } })),
        ("items.update", json!({ "itemId": "missing", "patch": {} })),
        ("items.delete", json!({ "itemId": "missing" })),
        ("items.publish", json!({ "itemId": "missing" })),
        ("items.reorder", json!({ "sectionId": "missing", "list": [] })),
        ("items.list", json!({ "sectionId": "missing" })),
        ("posts.update", json!({ "postId": post_id, "patch": { "description": "d" } })),
        ("posts.publish", json!({ "postId": post_id })),
        ("posts.open", json!({ "postId": post_id })),
        ("postChapters.create", json!({ "postId": post_id, "data": { "title": "PC" } })),
        ("postChapters.update", json!({ "postChapterId": "missing", "patch": {} })),
        ("postChapters.delete", json!({ "postChapterId": "missing" })),
        ("postChapters.publish", json!({ "postChapterId": "missing" })),
        ("postChapters.reorder", json!({ "postId": post_id, "list": [] })),
        ("favorites.add", json!({ "videoId": "missing" })),
        ("favorites.remove", json!({ "favoriteId": "missing" })),
        ("favorites.list", json!({})),
        ("favorites.reorder", json!({ "list": [] })),
        ("profileLinks.add", json!({ "label": "L", "url": "https://l" })),
        ("profileLinks.remove", json!({ "linkId": "missing" })),
        ("profileLinks.list", json!({})),
        ("profileLinks.reorder", json!({ "list": [] })),
        ("purchases.record", json!({ "courseId": course_id })),
        ("progress.mark", json!({ "chapterId": "missing" })),
        ("progress.course", json!({ "courseId": course_id })),
        ("progress.dashboard", json!({})),
        ("posts.delete", json!({ "postId": post_id })),
    ];
    for (i, (method, params)) in calls.into_iter().enumerate() {
        let resp = request_as(&mut stdin, &mut reader, &format!("c{i}"), "smoke", method, params);
        if resp.get("ok").and_then(|v| v.as_bool()) == Some(false) {
            assert_ne!(error_code(&resp), "not_implemented", "unrouted method {}", method);
        }
    }

    let unknown = request_as(&mut stdin, &mut reader, "u", "smoke", "courses.explode", json!({}));
    assert_eq!(error_code(&unknown), "not_implemented");
    let leaf_toggle = request_as(
        &mut stdin,
        &mut reader,
        "u2",
        "smoke",
        "sections.togglePublish",
        json!({ "sectionId": "missing" }),
    );
    assert_eq!(error_code(&leaf_toggle), "not_implemented");

    let export = request_ok_as(
        &mut stdin,
        &mut reader,
        "b1",
        "smoke",
        "backup.exportWorkspace",
        json!({ "outPath": bundle_out.to_string_lossy() }),
    );
    assert_eq!(str_field(&export, "bundleFormat"), "coursed-workspace-v1");
    let import = request_ok_as(
        &mut stdin,
        &mut reader,
        "b2",
        "smoke",
        "backup.importWorkspace",
        json!({
            "inPath": bundle_out.to_string_lossy(),
            "workspacePath": restored.to_string_lossy()
        }),
    );
    assert_eq!(str_field(&import, "bundleFormatDetected"), "coursed-workspace-v1");

    // The restored workspace is now active and carries the exported course.
    let listed = request_ok_as(&mut stdin, &mut reader, "b3", "smoke", "courses.list", json!({}));
    let ids: Vec<String> = listed["courses"]
        .as_array()
        .expect("courses")
        .iter()
        .map(|c| str_field(c, "id"))
        .collect();
    assert_eq!(ids, vec![course_id]);

    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(restored);
}
