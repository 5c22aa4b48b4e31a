// tests/engine_fake_executor.rs

mod common;
use crate::common::builders::{assign, cmd, for_, if_, pipe, redirected, script, while_};
use crate::common::{fake_builder, fake_engine, init_tracing, FakeExecutor, FakeResponse, RecordingGate};

use std::sync::Arc;
use std::time::Duration;

use shode::ast::{IfNode, Node, RedirectNode, ScriptNode};
use shode::engine::ExecContext;
use shode::errors::EngineError;
use shode::security::AllowAll;
use shode::types::ExecutionMode;

#[tokio::test]
async fn execute_stops_after_first_failing_command() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let fake = FakeExecutor::new();
    fake.respond_with("broken", 3, "", "boom\n");
    let engine = fake_engine(tmp.path(), fake.clone(), Arc::new(AllowAll));

    let s = script([
        cmd("hello", &["one"]).into(),
        cmd("broken", &[]).into(),
        cmd("hello", &["three"]).into(),
    ]);
    let result = engine.execute(&ExecContext::background(), &s).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.exit_code, 3);
    assert_eq!(result.command_results.len(), 2);
    assert_eq!(result.output, "one\n");
    assert_eq!(result.error, "boom\n");
    assert_eq!(fake.calls("hello"), 1);
}

#[tokio::test]
async fn empty_script_succeeds() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = fake_engine(tmp.path(), FakeExecutor::new(), Arc::new(AllowAll));

    let result = engine
        .execute(&ExecContext::background(), &ScriptNode::new(vec![]))
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.exit_code, 0);
    assert!(result.command_results.is_empty());
}

#[tokio::test]
async fn intrinsics_never_reach_the_backend() {
    let tmp = tempfile::tempdir().unwrap();
    let fake = FakeExecutor::new();
    let engine = fake_engine(tmp.path(), fake.clone(), Arc::new(AllowAll));

    let result = engine
        .execute_command(&ExecContext::background(), &cmd("ToUpper", &["shout"]))
        .await
        .unwrap();
    assert_eq!(result.output, "SHOUT");
    assert_eq!(result.mode, Some(ExecutionMode::Interpreted));
    assert!(fake.requests().is_empty());
}

#[tokio::test]
async fn process_commands_get_the_store_environment() {
    let tmp = tempfile::tempdir().unwrap();
    let fake = FakeExecutor::new();
    let engine = fake_engine(tmp.path(), fake.clone(), Arc::new(AllowAll));

    let s = script([
        assign("GREETING", "hi"),
        cmd("tool", &["$GREETING", "${GREETING}!"]).into(),
    ]);
    let result = engine.execute(&ExecContext::background(), &s).await.unwrap();
    assert!(result.success);

    let requests = fake.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].args, vec!["hi", "hi!"]);
    assert_eq!(requests[0].env.get("GREETING").map(String::as_str), Some("hi"));
    assert_eq!(requests[0].working_dir, tmp.path());
    assert_eq!(result.command_results[0].mode, Some(ExecutionMode::Process));
}

#[tokio::test]
async fn spawn_failure_is_an_ordinary_failed_result() {
    let tmp = tempfile::tempdir().unwrap();
    let fake = FakeExecutor::new();
    fake.respond("ghost", FakeResponse::SpawnError);
    let engine = fake_engine(tmp.path(), fake, Arc::new(AllowAll));

    let result = engine
        .execute_command(&ExecContext::background(), &cmd("ghost", &[]))
        .await
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.exit_code, 1);
    assert!(result.error.contains("failed to spawn"));
}

#[tokio::test]
async fn pipeline_feeds_each_stage_the_previous_output() {
    let tmp = tempfile::tempdir().unwrap();
    let fake = FakeExecutor::new();
    fake.respond_with("gen", 0, "a\nb\n", "");
    let engine = fake_engine(tmp.path(), fake.clone(), Arc::new(AllowAll));

    let node = pipe(vec![cmd("gen", &[]), cmd("cat", &[]), cmd("ToUpper", &[])]);
    let Node::Pipe(p) = node else { unreachable!() };
    let result = engine
        .execute_pipeline(&ExecContext::background(), &p)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.output, "A\nB\n");
    assert_eq!(result.stage_results.len(), 3);

    let requests = fake.requests();
    assert_eq!(requests[0].stdin, None);
    assert_eq!(requests[1].stdin.as_deref(), Some("a\nb\n"));
}

#[tokio::test]
async fn pipeline_halts_on_failing_stage() {
    let tmp = tempfile::tempdir().unwrap();
    let fake = FakeExecutor::new();
    fake.respond_with("first", 0, "x", "warn1;");
    fake.respond_with("second", 2, "", "err2;");
    let engine = fake_engine(tmp.path(), fake.clone(), Arc::new(AllowAll));

    let s = script([pipe(vec![cmd("first", &[]), cmd("second", &[]), cmd("third", &[])])]);
    let result = engine.execute(&ExecContext::background(), &s).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.exit_code, 2);
    assert_eq!(result.error, "warn1;err2;");
    assert_eq!(result.command_results.len(), 2);
    assert_eq!(fake.calls("third"), 0);
}

#[tokio::test]
async fn redirect_node_at_top_level_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = fake_engine(tmp.path(), FakeExecutor::new(), Arc::new(AllowAll));

    let s = script([Node::Redirect(RedirectNode::truncate("out.txt"))]);
    let err = engine.execute(&ExecContext::background(), &s).await.unwrap_err();
    assert_eq!(err, EngineError::UnsupportedNode { kind: "redirect" });
}

#[tokio::test]
async fn process_output_redirect_writes_the_file() {
    let tmp = tempfile::tempdir().unwrap();
    let fake = FakeExecutor::new();
    fake.respond_with("report", 0, "data\n", "noise\n");
    let engine = fake_engine(tmp.path(), fake, Arc::new(AllowAll));

    let c = redirected("report", &[], RedirectNode::new("&>", "all.log", 1));
    let result = engine
        .execute_command(&ExecContext::background(), &c)
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.output, "");

    let written = std::fs::read_to_string(tmp.path().join("all.log")).unwrap();
    assert_eq!(written, "data\nnoise\n");
}

#[tokio::test]
async fn if_picks_branch_by_condition() {
    let tmp = tempfile::tempdir().unwrap();
    let fake = FakeExecutor::new();
    fake.respond_with("yes", 0, "", "");
    fake.respond_with("no", 1, "", "");
    let engine = fake_engine(tmp.path(), fake, Arc::new(AllowAll));
    let ctx = ExecContext::background();

    let then_body = script([cmd("Print", &["then"]).into()]);
    let else_body = script([cmd("Print", &["else"]).into()]);

    let taken = engine
        .execute(&ctx, &script([if_(cmd("yes", &[]), then_body.clone(), Some(else_body.clone()))]))
        .await
        .unwrap();
    assert_eq!(taken.output, "then");
    // Condition probes are not recorded.
    assert_eq!(taken.command_results.len(), 1);

    let skipped = engine
        .execute(&ctx, &script([if_(cmd("no", &[]), then_body.clone(), Some(else_body))]))
        .await
        .unwrap();
    assert_eq!(skipped.output, "else");

    let nothing = engine
        .execute(&ctx, &script([if_(cmd("no", &[]), then_body, None)]))
        .await
        .unwrap();
    assert!(nothing.success);
    assert_eq!(nothing.output, "");
}

#[tokio::test]
async fn non_command_condition_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = fake_engine(tmp.path(), FakeExecutor::new(), Arc::new(AllowAll));

    let node = Node::If(IfNode::new(
        assign("X", "1"),
        ScriptNode::new(vec![]),
        None,
    ));
    let err = engine
        .execute(&ExecContext::background(), &script([node]))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::UnsupportedCondition { kind: "assignment" });
}

#[tokio::test]
async fn for_binds_each_item_in_order() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = fake_engine(tmp.path(), FakeExecutor::new(), Arc::new(AllowAll));

    let s = script([
        assign("LAST", "c"),
        for_("x", &["a", "b", "$LAST"], script([cmd("Println", &["item=$x"]).into()])),
    ]);
    let result = engine.execute(&ExecContext::background(), &s).await.unwrap();

    assert_eq!(result.output, "item=a\nitem=b\nitem=c\n");
    assert_eq!(engine.env().get("x").as_deref(), Some("c"));
}

#[tokio::test]
async fn for_over_no_items_runs_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let fake = FakeExecutor::new();
    let engine = fake_engine(tmp.path(), fake.clone(), Arc::new(AllowAll));

    let s = script([for_("x", &[], script([cmd("tool", &[]).into()]))]);
    let result = engine.execute(&ExecContext::background(), &s).await.unwrap();
    assert!(result.success);
    assert!(fake.requests().is_empty());
}

#[tokio::test]
async fn while_with_false_condition_never_runs_the_body() {
    let tmp = tempfile::tempdir().unwrap();
    let gate = Arc::new(RecordingGate::new());
    let engine = fake_engine(tmp.path(), FakeExecutor::new(), gate.clone());

    let s = script([while_(
        cmd("ChangeDir", &["/definitely/not/here"]),
        script([cmd("Print", &["body"]).into()]),
    )]);
    let result = engine.execute(&ExecContext::background(), &s).await.unwrap();

    assert!(result.success);
    assert_eq!(result.output, "");
    assert_eq!(gate.checks_for("ChangeDir"), 1);
    assert_eq!(gate.checks_for("Print"), 0);
}

#[tokio::test]
async fn while_evaluates_its_condition_at_most_the_limit() {
    let tmp = tempfile::tempdir().unwrap();
    let gate = Arc::new(RecordingGate::new());
    let engine = fake_engine(tmp.path(), FakeExecutor::new(), gate.clone());

    let s = script([while_(
        cmd("Contains", &["abc", "b"]),
        script([cmd("Trim", &[" x "]).into()]),
    )]);
    let err = engine
        .execute(&ExecContext::background(), &s)
        .await
        .unwrap_err();

    assert_eq!(err, EngineError::LoopLimitExceeded { limit: 10_000 });
    assert_eq!(gate.checks_for("Contains"), 10_000);
    assert_eq!(gate.checks_for("Trim"), 10_000);
}

#[tokio::test]
async fn configured_while_limit_is_honoured() {
    let tmp = tempfile::tempdir().unwrap();
    let gate = Arc::new(RecordingGate::new());
    let engine = fake_builder(tmp.path(), FakeExecutor::new(), gate.clone())
        .max_while_iterations(3)
        .build();

    let s = script([while_(cmd("Contains", &["abc", "b"]), ScriptNode::new(vec![]))]);
    let err = engine
        .execute(&ExecContext::background(), &s)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::LoopLimitExceeded { limit: 3 });
    assert_eq!(gate.checks_for("Contains"), 3);
}

#[tokio::test]
async fn loop_body_commands_pass_the_gate() {
    let tmp = tempfile::tempdir().unwrap();
    let gate = Arc::new(RecordingGate::new());
    let engine = fake_engine(tmp.path(), FakeExecutor::new(), gate.clone());

    let s = script([for_(
        "f",
        &["1", "2"],
        script([pipe(vec![cmd("gen", &["$f"]), cmd("cat", &[])])]),
    )]);
    engine.execute(&ExecContext::background(), &s).await.unwrap();

    assert_eq!(gate.seen(), vec!["gen", "cat", "gen", "cat"]);
}

#[tokio::test]
async fn cancellation_aborts_a_running_command() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let fake = FakeExecutor::new();
    fake.respond("slow", FakeResponse::Sleep(Duration::from_secs(30)));
    let engine = fake_engine(tmp.path(), fake, Arc::new(AllowAll));

    let (ctx, cancel) = ExecContext::background().with_cancel();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let s = script([cmd("slow", &[]).into(), cmd("Print", &["after"]).into()]);
    let err = common::with_timeout(engine.execute(&ctx, &s)).await.unwrap_err();
    assert_eq!(err, EngineError::Cancelled);
}

#[tokio::test]
async fn deadline_aborts_the_script() {
    let tmp = tempfile::tempdir().unwrap();
    let fake = FakeExecutor::new();
    fake.respond("slow", FakeResponse::Sleep(Duration::from_secs(30)));
    let engine = fake_engine(tmp.path(), fake, Arc::new(AllowAll));

    let ctx = ExecContext::background().with_timeout(Duration::from_millis(50));
    let err = common::with_timeout(engine.execute(&ctx, &script([cmd("slow", &[]).into()])))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::DeadlineExceeded);
}

#[tokio::test]
async fn already_cancelled_context_runs_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let fake = FakeExecutor::new();
    let engine = fake_engine(tmp.path(), fake.clone(), Arc::new(AllowAll));

    let (ctx, cancel) = ExecContext::background().with_cancel();
    cancel.cancel();
    let err = engine
        .execute(&ctx, &script([cmd("tool", &[]).into()]))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::Cancelled);
    assert!(fake.requests().is_empty());
}

#[tokio::test]
async fn pool_slots_are_returned_after_each_command() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = fake_engine(tmp.path(), FakeExecutor::new(), Arc::new(AllowAll));

    let s = script([
        cmd("alpha", &["1"]).into(),
        cmd("alpha", &["2"]).into(),
        cmd("beta", &[]).into(),
    ]);
    engine.execute(&ExecContext::background(), &s).await.unwrap();

    let stats = engine.pool().stats();
    assert_eq!(stats.in_flight, 0);
    assert_eq!(stats.available_permits, engine.pool().max_slots());
    assert_eq!(engine.pool().uses("alpha"), Some(2));
}

proptest::proptest! {
    #[test]
    fn pipeline_stages_see_the_previous_stdout(
        text in "[a-z\n]{0,40}",
        extra_stages in 1usize..5,
    ) {
        let tmp = tempfile::tempdir().unwrap();
        let fake = FakeExecutor::new();
        let engine = fake_engine(tmp.path(), fake.clone(), Arc::new(AllowAll));

        let mut stages = vec![cmd("Print", &[text.as_str()])];
        stages.extend((0..extra_stages).map(|_| cmd("cat", &[])));
        let Node::Pipe(p) = pipe(stages) else { unreachable!() };

        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let result = rt.block_on(engine.execute_pipeline(&ExecContext::background(), &p)).unwrap();

        proptest::prop_assert!(result.success);
        proptest::prop_assert_eq!(&result.output, &text);
        for request in fake.requests() {
            proptest::prop_assert_eq!(request.stdin.as_deref(), Some(text.as_str()));
        }
    }
}
