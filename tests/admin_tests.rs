// tests/admin_tests.rs

mod common;

use common::{PASSWORD, answer, spawn_app, unique_name};
use serde_json::{Value, json};

#[tokio::test]
async fn admin_routes_require_admin_role() {
    // Arrange
    let app = spawn_app().await;
    let (_, student) = app.student().await;

    // Act
    let as_student = app
        .client
        .get(app.url("/api/admin/users"))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();
    let anonymous = app.client.get(app.url("/api/admin/users")).send().await.unwrap();

    // Assert
    assert_eq!(as_student.status().as_u16(), 403);
    assert_eq!(anonymous.status().as_u16(), 401);
}

#[tokio::test]
async fn user_management_flow() {
    // Arrange
    let app = spawn_app().await;
    let admin = app.admin().await;
    let username = unique_name("t");

    // Act: create
    let created = app
        .client
        .post(app.url("/api/admin/users"))
        .bearer_auth(&admin)
        .json(&json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": PASSWORD,
            "role": "admin",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status().as_u16(), 201);
    let created: Value = created.json().await.unwrap();
    let user_id = created["id"].as_i64().unwrap();

    // Act: duplicate
    let duplicate = app
        .client
        .post(app.url("/api/admin/users"))
        .bearer_auth(&admin)
        .json(&json!({
            "username": username,
            "email": "other@example.com",
            "password": PASSWORD,
        }))
        .send()
        .await
        .unwrap();

    // Act: demote
    let updated = app
        .client
        .put(app.url(&format!("/api/admin/users/{}", user_id)))
        .bearer_auth(&admin)
        .json(&json!({"role": "student"}))
        .send()
        .await
        .unwrap();
    let updated_status = updated.status().as_u16();
    let updated: Value = updated.json().await.unwrap();

    // Act: list, delete, delete again
    let (_, users) = app.get_json(&admin, "/api/admin/users").await;
    let deleted = app
        .client
        .delete(app.url(&format!("/api/admin/users/{}", user_id)))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let deleted_again = app
        .client
        .delete(app.url(&format!("/api/admin/users/{}", user_id)))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(created["role"], "admin");
    assert_eq!(duplicate.status().as_u16(), 409);
    assert_eq!(updated_status, 200);
    assert_eq!(updated["role"], "student");
    assert!(
        users
            .as_array()
            .unwrap()
            .iter()
            .all(|u| u.get("password").is_none())
    );
    assert_eq!(deleted.status().as_u16(), 204);
    assert_eq!(deleted_again.status().as_u16(), 404);
}

#[tokio::test]
async fn demoted_or_deleted_admin_loses_access_immediately() {
    // Arrange
    let app = spawn_app().await;
    let admin = app.admin().await;
    let demoted = app.admin().await;
    let removed = app.admin().await;
    let (_, demoted_me) = app.get_json(&demoted, "/api/auth/me").await;
    let (_, removed_me) = app.get_json(&removed, "/api/auth/me").await;

    let (before, _) = app.get_json(&demoted, "/api/admin/users").await;
    assert_eq!(before, 200);

    // Act
    let demote = app
        .client
        .put(app.url(&format!("/api/admin/users/{}", demoted_me["id"])))
        .bearer_auth(&admin)
        .json(&json!({"role": "student"}))
        .send()
        .await
        .unwrap();
    let delete = app
        .client
        .delete(app.url(&format!("/api/admin/users/{}", removed_me["id"])))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();

    let (demoted_status, _) = app.get_json(&demoted, "/api/admin/users").await;
    let (removed_status, _) = app.get_json(&removed, "/api/admin/users").await;

    // Assert
    assert_eq!(demote.status().as_u16(), 200);
    assert_eq!(delete.status().as_u16(), 204);
    assert_eq!(demoted_status, 403);
    assert_eq!(removed_status, 401);
}

#[tokio::test]
async fn admin_cannot_delete_self() {
    // Arrange
    let app = spawn_app().await;
    let admin = app.admin().await;
    let (_, me) = app.get_json(&admin, "/api/auth/me").await;
    let my_id = me["id"].as_i64().unwrap();

    // Act
    let response = app
        .client
        .delete(app.url(&format!("/api/admin/users/{}", my_id)))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn quiz_crud_and_validation() {
    // Arrange
    let app = spawn_app().await;
    let admin = app.admin().await;

    // Act: invalid pass_score and num_questions
    let bad_pass = app
        .client
        .post(app.url("/api/admin/quizzes"))
        .bearer_auth(&admin)
        .json(&json!({"title": "Bad", "pass_score": 11}))
        .send()
        .await
        .unwrap();
    let bad_count = app
        .client
        .post(app.url("/api/admin/quizzes"))
        .bearer_auth(&admin)
        .json(&json!({"title": "Bad", "num_questions": 0}))
        .send()
        .await
        .unwrap();

    // Act: create with markup in the title, then update
    let quiz_id = app
        .create_quiz(
            &admin,
            json!({"title": "Rust <script>alert(1)</script>basics", "num_questions": 3}),
        )
        .await;
    let (_, created) = app
        .get_json(&admin, &format!("/api/admin/quizzes/{}", quiz_id))
        .await;

    let update = app
        .client
        .put(app.url(&format!("/api/admin/quizzes/{}", quiz_id)))
        .bearer_auth(&admin)
        .json(&json!({"mode": "practice", "pass_score": 8.0, "clear_num_questions": true}))
        .send()
        .await
        .unwrap();
    let update_status = update.status().as_u16();
    let updated: Value = update.json().await.unwrap();

    let missing = app
        .client
        .put(app.url("/api/admin/quizzes/999999"))
        .bearer_auth(&admin)
        .json(&json!({"title": "Nope"}))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(bad_pass.status().as_u16(), 400);
    assert_eq!(bad_count.status().as_u16(), 400);

    assert!(!created["title"].as_str().unwrap().contains("<script>"));
    assert_eq!(created["mode"], "exam");
    assert_eq!(created["pass_score"].as_f64(), Some(5.0));
    assert_eq!(created["show_explanation"], true);
    assert_eq!(created["is_active"], true);
    assert!(created["created_by"].is_i64());

    assert_eq!(update_status, 200);
    assert_eq!(updated["mode"], "practice");
    assert_eq!(updated["pass_score"].as_f64(), Some(8.0));
    assert!(updated["num_questions"].is_null());
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn question_choice_rules_are_enforced() {
    // Arrange
    let app = spawn_app().await;
    let admin = app.admin().await;
    let quiz_id = app.create_quiz(&admin, json!({"title": "Rules"})).await;
    let questions_url = app.url(&format!("/api/admin/quizzes/{}/questions", quiz_id));

    // Act
    let two_correct = app
        .client
        .post(&questions_url)
        .bearer_auth(&admin)
        .json(&json!({
            "type": "mcq",
            "content": "Pick one",
            "choices": [
                {"content": "A", "is_correct": true},
                {"content": "B", "is_correct": true},
            ],
        }))
        .send()
        .await
        .unwrap();
    let three_way_true_false = app
        .client
        .post(&questions_url)
        .bearer_auth(&admin)
        .json(&json!({
            "type": "true_false",
            "content": "Is it?",
            "choices": [
                {"content": "True", "is_correct": true},
                {"content": "False"},
                {"content": "Maybe"},
            ],
        }))
        .send()
        .await
        .unwrap();
    let marked_essay = app
        .client
        .post(&questions_url)
        .bearer_auth(&admin)
        .json(&json!({
            "type": "essay",
            "content": "Discuss",
            "choices": [{"content": "model answer", "is_correct": true}],
        }))
        .send()
        .await
        .unwrap();
    let unknown_quiz = app
        .client
        .post(app.url("/api/admin/quizzes/999999/questions"))
        .bearer_auth(&admin)
        .json(&json!({"type": "essay", "content": "Orphan"}))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(two_correct.status().as_u16(), 400);
    assert_eq!(three_way_true_false.status().as_u16(), 400);
    assert_eq!(marked_essay.status().as_u16(), 400);
    assert_eq!(unknown_quiz.status().as_u16(), 404);

    let (_, listed) = app
        .get_json(&admin, &format!("/api/admin/quizzes/{}/questions", quiz_id))
        .await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn question_update_replaces_choices_and_keeps_rules() {
    // Arrange
    let app = spawn_app().await;
    let admin = app.admin().await;
    let quiz_id = app.create_quiz(&admin, json!({"title": "Edits"})).await;
    let (question_id, _, _) = app.create_mcq(&admin, quiz_id, "Original").await;
    let question_url = app.url(&format!("/api/admin/questions/{}", question_id));

    // Act: switching to essay while a correct choice exists
    let to_essay = app
        .client
        .put(&question_url)
        .bearer_auth(&admin)
        .json(&json!({"type": "essay"}))
        .send()
        .await
        .unwrap();

    // Act: replace choices
    let replaced = app
        .client
        .put(&question_url)
        .bearer_auth(&admin)
        .json(&json!({
            "content": "Edited",
            "choices": [
                {"content": "x", "is_correct": false},
                {"content": "y", "is_correct": false},
                {"content": "z", "is_correct": true},
            ],
        }))
        .send()
        .await
        .unwrap();
    let replaced_status = replaced.status().as_u16();
    let replaced: Value = replaced.json().await.unwrap();

    // Act: delete twice
    let deleted = app
        .client
        .delete(&question_url)
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let deleted_again = app
        .client
        .delete(&question_url)
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(to_essay.status().as_u16(), 400);
    assert_eq!(replaced_status, 200);
    assert_eq!(replaced["content"], "Edited");
    assert_eq!(replaced["type"], "mcq");
    let choices = replaced["choices"].as_array().unwrap();
    assert_eq!(choices.len(), 3);
    assert_eq!(choices.iter().filter(|c| c["is_correct"] == true).count(), 1);
    assert_eq!(deleted.status().as_u16(), 204);
    assert_eq!(deleted_again.status().as_u16(), 404);
}

#[tokio::test]
async fn answered_question_cannot_be_deleted() {
    // Arrange
    let app = spawn_app().await;
    let admin = app.admin().await;
    let quiz_id = app
        .create_quiz(&admin, json!({"title": "Kept", "mode": "practice"}))
        .await;
    let (answered, correct, _) = app.create_mcq(&admin, quiz_id, "Answered").await;
    let (other, _, wrong) = app.create_mcq(&admin, quiz_id, "Also answered").await;
    let (user_id, token) = app.student().await;
    let location = app
        .submit(&token, quiz_id, &[answer(answered, correct), answer(other, wrong)])
        .await;
    let (fresh, _, _) = app.create_mcq(&admin, quiz_id, "Added later").await;

    // Act
    let blocked = app
        .client
        .delete(app.url(&format!("/api/admin/questions/{}", answered)))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let blocked_status = blocked.status().as_u16();
    let blocked: Value = blocked.json().await.unwrap();
    let unanswered = app
        .client
        .delete(app.url(&format!("/api/admin/questions/{}", fresh)))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(blocked_status, 409);
    assert!(blocked["error"].is_string());
    assert_eq!(unanswered.status().as_u16(), 204);

    let (status, result) = app.get_json(&token, &location).await;
    assert_eq!(status, 200);
    assert_eq!(result["submission"]["user_id"].as_i64(), Some(user_id));
    assert_eq!(result["submission"]["total_questions"].as_i64(), Some(2));
    assert_eq!(result["submission"]["correct_answers"].as_i64(), Some(1));
    assert_eq!(result["answers"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn deleting_quiz_cascades_to_submissions() {
    // Arrange
    let app = spawn_app().await;
    let admin = app.admin().await;
    let quiz_id = app
        .create_quiz(&admin, json!({"title": "Doomed", "mode": "practice"}))
        .await;
    let (question_id, correct, _) = app.create_mcq(&admin, quiz_id, "Q").await;
    let (_, token) = app.student().await;
    app.submit(&token, quiz_id, &[answer(question_id, correct)])
        .await;

    // Act
    let response = app
        .client
        .delete(app.url(&format!("/api/admin/quizzes/{}", quiz_id)))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status().as_u16(), 204);
    let remaining: i64 = sqlx::query_scalar(
        "SELECT (SELECT COUNT(*) FROM submissions WHERE quiz_id = ?1) + (SELECT COUNT(*) FROM questions WHERE quiz_id = ?1)",
    )
    .bind(quiz_id)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(remaining, 0);

    let (status, _) = app
        .get_json(&admin, &format!("/api/admin/quizzes/{}", quiz_id))
        .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn regrade_runs_essay_grading() {
    // Arrange
    let app = spawn_app().await;
    let admin = app.admin().await;
    let quiz_id = app
        .create_quiz(&admin, json!({"title": "Regrade", "mode": "practice"}))
        .await;
    let essay = app
        .create_question(&admin, quiz_id, json!({"type": "essay", "content": "Why?"}))
        .await;
    let (_, token) = app.student().await;
    let location = app
        .submit(
            &token,
            quiz_id,
            &[answer(essay["id"].as_i64().unwrap(), "Because.")],
        )
        .await;
    let submission_id: i64 = location.rsplit('/').next().unwrap().parse().unwrap();

    // Act
    let regrade = app
        .client
        .post(app.url(&format!("/api/admin/submissions/{}/grade", submission_id)))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let missing = app
        .client
        .post(app.url("/api/admin/submissions/999999/grade"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(regrade.status().as_u16(), 202);
    let body: Value = regrade.json().await.unwrap();
    assert_eq!(body["mode"], "inline");
    assert_eq!(missing.status().as_u16(), 404);
}
