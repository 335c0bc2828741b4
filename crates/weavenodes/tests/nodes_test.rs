use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};
use weavecore::services::{
    AssetStore, ImageRequest, MediaGeneration, MediaJob, MediaProcessing, SpeechRequest,
    SpeechSynthesis, TextGeneration, TextRequest, VideoRequest,
};
use weavecore::{
    BinaryRef, Effector, EffectorContext, ExecutionTrigger, NodeDataItem, NodeError, NodeId,
    ServiceError, Services, Workflow, WorkflowNode, MAIN_PORT,
};
use weavenodes::*;
use weaveruntime::{Runtime, RuntimeConfig};

#[derive(Default)]
struct FakeText {
    requests: Mutex<Vec<TextRequest>>,
}

#[async_trait]
impl TextGeneration for FakeText {
    async fn generate(&self, request: TextRequest) -> Result<String, ServiceError> {
        let reply = format!("story about {}", request.prompt);
        self.requests.lock().unwrap().push(request);
        Ok(reply)
    }
}

struct FakeMedia;

#[async_trait]
impl MediaGeneration for FakeMedia {
    async fn generate_image(&self, request: ImageRequest) -> Result<BinaryRef, ServiceError> {
        Ok(BinaryRef::remote(
            format!("https://cdn.test/{}x{}.png", request.width, request.height),
            "image/png",
            "image.png",
        ))
    }

    async fn generate_video(&self, request: VideoRequest) -> Result<BinaryRef, ServiceError> {
        if request.prompt.is_empty() {
            return Err(ServiceError::Rejected("empty prompt".to_string()));
        }
        Ok(BinaryRef::remote("https://cdn.test/clip.mp4", "video/mp4", "clip.mp4"))
    }
}

#[derive(Default)]
struct FakeProcessing {
    jobs: Mutex<Vec<MediaJob>>,
}

#[async_trait]
impl MediaProcessing for FakeProcessing {
    async fn process(&self, job: MediaJob) -> Result<BinaryRef, ServiceError> {
        let name = format!("{}-{}.mp4", job.operation, job.inputs.len());
        self.jobs.lock().unwrap().push(job);
        Ok(BinaryRef::new("AAAA", "video/mp4", name))
    }
}

struct FakeSpeech;

#[async_trait]
impl SpeechSynthesis for FakeSpeech {
    async fn synthesize(&self, request: SpeechRequest) -> Result<BinaryRef, ServiceError> {
        Ok(BinaryRef::new(request.text, "audio/mpeg", "speech.mp3"))
    }
}

#[derive(Default)]
struct FakeAssets {
    stored: Mutex<Vec<String>>,
}

#[async_trait]
impl AssetStore for FakeAssets {
    async fn put(&self, file_name: &str, _content: &BinaryRef) -> Result<String, ServiceError> {
        self.stored.lock().unwrap().push(file_name.to_string());
        Ok(format!("/exports/{}", file_name))
    }
}

fn context(kind: &str) -> EffectorContext {
    EffectorContext::new(NodeId::new_v4(), kind)
}

fn item(value: serde_json::Value) -> NodeDataItem {
    NodeDataItem::from_value(value)
}

fn clip(name: &str) -> BinaryRef {
    BinaryRef::new("AAAA", "video/mp4", name)
}

#[tokio::test]
async fn test_manual_trigger_emits_seed_or_empty_item() {
    let out = ManualTrigger.execute(context(MANUAL_TRIGGER)).await.unwrap();
    assert_eq!(out, vec![NodeDataItem::default()]);

    let seed = vec![item(json!({ "topic": "owls" }))];
    let out = ManualTrigger
        .execute(context(MANUAL_TRIGGER).with_input(seed.clone()))
        .await
        .unwrap();
    assert_eq!(out, seed);
}

#[tokio::test]
async fn test_text_generation_renders_prompt_per_item() {
    let text = Arc::new(FakeText::default());
    let ctx = context(TEXT_GENERATION)
        .with_services(Services::new().with_text(text.clone()))
        .with_parameter("prompt", "Write about {{topic}}")
        .with_parameter("systemPrompt", "You narrate {{style}}")
        .with_parameter("outputField", "script")
        .with_input(vec![
            item(json!({ "topic": "owls", "style": "softly" })),
            item(json!({ "topic": "bats" })),
        ]);

    let out = TextGenerationEffector.execute(ctx).await.unwrap();

    assert_eq!(out.len(), 2);
    assert_eq!(out[0].json["script"], "story about Write about owls");
    assert_eq!(out[0].json["topic"], "owls");
    assert_eq!(out[1].json["script"], "story about Write about bats");

    let requests = text.requests.lock().unwrap();
    assert_eq!(requests[0].system_prompt.as_deref(), Some("You narrate softly"));
    assert_eq!(requests[1].system_prompt.as_deref(), Some("You narrate "));
}

#[tokio::test]
async fn test_missing_service_is_configuration_error() {
    let ctx = context(TEXT_GENERATION)
        .with_parameter("prompt", "hi")
        .with_input(vec![NodeDataItem::default()]);

    let err = TextGenerationEffector.execute(ctx).await.unwrap_err();

    assert!(matches!(err, NodeError::Configuration(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_image_generation_attaches_binary() {
    let ctx = context(IMAGE_GENERATION)
        .with_services(Services::new().with_media(Arc::new(FakeMedia)))
        .with_parameter("prompt", "a {{animal}}")
        .with_parameter("width", 512)
        .with_parameter("height", 256)
        .with_input(vec![item(json!({ "animal": "fox" }))]);

    let out = ImageGenerationEffector.execute(ctx).await.unwrap();

    let image = &out[0].binary["image"];
    assert_eq!(image.url.as_deref(), Some("https://cdn.test/512x256.png"));
    assert_eq!(image.mime_type, "image/png");
}

#[tokio::test]
async fn test_video_generation_requires_source_image_when_configured() {
    let ctx = context(VIDEO_GENERATION)
        .with_services(Services::new().with_media(Arc::new(FakeMedia)))
        .with_parameter("prompt", "pan across {{scene}}")
        .with_parameter("durationSeconds", 5)
        .with_parameter("imageProperty", "image")
        .with_input(vec![item(json!({ "scene": "hills" }))]);

    let err = VideoGenerationEffector.execute(ctx).await.unwrap_err();
    assert_eq!(err, NodeError::MissingInput("binary property 'image'".to_string()));
}

#[tokio::test]
async fn test_video_generation_service_error_is_retryable() {
    let ctx = context(VIDEO_GENERATION)
        .with_services(Services::new().with_media(Arc::new(FakeMedia)))
        .with_parameter("prompt", "{{missing}}")
        .with_parameter("durationSeconds", 5)
        .with_input(vec![NodeDataItem::default()]);

    let err = VideoGenerationEffector.execute(ctx).await.unwrap_err();
    assert!(matches!(err, NodeError::Service(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_media_concat_builds_single_job() {
    let processing = Arc::new(FakeProcessing::default());
    let ctx = context(MEDIA_PROCESS)
        .with_services(Services::new().with_processing(processing.clone()))
        .with_parameter("operation", "concat")
        .with_parameter("binaryProperty", "video")
        .with_input(vec![
            NodeDataItem::default().with_binary("video", clip("a.mp4")),
            NodeDataItem::default().with_binary("video", clip("b.mp4")),
            NodeDataItem::default().with_binary("video", clip("c.mp4")),
        ]);

    let out = MediaProcessEffector.execute(ctx).await.unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].json["clipCount"], 3);
    assert_eq!(out[0].binary["output"].file_name, "concat-3.mp4");
    let jobs = processing.jobs.lock().unwrap();
    assert_eq!(jobs.len(), 1);
    let names: Vec<_> = jobs[0].inputs.iter().map(|b| b.file_name.as_str()).collect();
    assert_eq!(names, vec!["a.mp4", "b.mp4", "c.mp4"]);
}

#[tokio::test]
async fn test_media_mux_audio_runs_per_item() {
    let processing = Arc::new(FakeProcessing::default());
    let ctx = context(MEDIA_PROCESS)
        .with_services(Services::new().with_processing(processing.clone()))
        .with_parameter("operation", "mux_audio")
        .with_parameter("binaryProperty", "video")
        .with_parameter("audioProperty", "audio")
        .with_input(vec![NodeDataItem::default()
            .with_binary("video", clip("v.mp4"))
            .with_binary("audio", BinaryRef::new("BBBB", "audio/mpeg", "a.mp3"))]);

    let out = MediaProcessEffector.execute(ctx).await.unwrap();

    assert_eq!(out[0].binary["output"].file_name, "mux_audio-2.mp4");
    assert!(out[0].binary.contains_key("video"));
}

#[tokio::test]
async fn test_media_unknown_operation() {
    let ctx = context(MEDIA_PROCESS)
        .with_services(Services::new().with_processing(Arc::new(FakeProcessing::default())))
        .with_parameter("operation", "explode")
        .with_input(vec![NodeDataItem::default().with_binary("video", clip("v.mp4"))]);

    let err = MediaProcessEffector.execute(ctx).await.unwrap_err();
    assert!(matches!(err, NodeError::InvalidParameter { name, .. } if name == "operation"));
}

#[tokio::test]
async fn test_text_to_speech_attaches_audio() {
    let ctx = context(TEXT_TO_SPEECH)
        .with_services(Services::new().with_speech(Arc::new(FakeSpeech)))
        .with_parameter("text", "{{script}}")
        .with_input(vec![item(json!({ "script": "Once upon a time" }))]);

    let out = TextToSpeechEffector.execute(ctx).await.unwrap();
    assert_eq!(out[0].binary["audio"].data, "Once upon a time");
}

#[tokio::test]
async fn test_set_merges_and_keeps_only_set() {
    let values = json!({ "title": "{{topic}} facts", "count": 3 });
    let input = vec![item(json!({ "topic": "owls", "extra": 1 }))];

    let out = SetEffector
        .execute(
            context(SET)
                .with_parameter("values", values.clone())
                .with_input(input.clone()),
        )
        .await
        .unwrap();
    assert_eq!(out[0].json["title"], "owls facts");
    assert_eq!(out[0].json["extra"], 1);

    let out = SetEffector
        .execute(
            context(SET)
                .with_parameter("values", values)
                .with_parameter("keepOnlySet", true)
                .with_input(input),
        )
        .await
        .unwrap();
    assert_eq!(serde_json::Value::Object(out[0].json.clone()), json!({ "title": "owls facts", "count": 3 }));
}

#[tokio::test]
async fn test_split_out_explodes_arrays() {
    let ctx = context(SPLIT_OUT)
        .with_parameter("field", "scenes")
        .with_input(vec![
            item(json!({ "scenes": [{ "shot": 1 }, { "shot": 2 }] })),
            item(json!({ "scenes": ["dawn", "dusk"] })),
            item(json!({ "other": true })),
        ]);

    let out = SplitOutEffector.execute(ctx).await.unwrap();

    assert_eq!(out.len(), 4);
    assert_eq!(out[1].json["shot"], 2);
    assert_eq!(out[2].json["scenes"], "dawn");
}

#[tokio::test]
async fn test_condition_operations() {
    let input = vec![
        item(json!({ "score": 7, "tags": ["calm"], "title": "night owl" })),
        item(json!({ "score": "2", "title": "day" })),
    ];
    let run = |operation: &str, field: &str, value: serde_json::Value| {
        let ctx = context(CONDITION)
            .with_parameter("field", field)
            .with_parameter("operation", operation)
            .with_parameter("value", value)
            .with_input(input.clone());
        async move { ConditionEffector.execute(ctx).await.unwrap().len() }
    };

    assert_eq!(run("equals", "score", json!("7")).await, 1);
    assert_eq!(run("not_equals", "score", json!(7)).await, 1);
    assert_eq!(run("contains", "title", json!("owl")).await, 1);
    assert_eq!(run("contains", "tags", json!("calm")).await, 1);
    assert_eq!(run("exists", "tags", json!(null)).await, 1);
    assert_eq!(run("greater_than", "score", json!(1)).await, 2);
    assert_eq!(run("less_than", "score", json!("5")).await, 1);
}

#[tokio::test]
async fn test_merge_modes() {
    let groups = vec![
        vec![item(json!({ "a": 1 })), item(json!({ "a": 2 }))],
        vec![item(json!({ "b": 1 }))],
    ];

    let appended = MergeEffector
        .execute(context(MERGE).with_input_groups(groups.clone()))
        .await
        .unwrap();
    assert_eq!(appended.len(), 3);

    let combined = MergeEffector
        .execute(
            context(MERGE)
                .with_parameter("mode", "combine_by_index")
                .with_input_groups(groups),
        )
        .await
        .unwrap();
    assert_eq!(combined.len(), 1);
    assert_eq!(serde_json::Value::Object(combined[0].json.clone()), json!({ "a": 1, "b": 1 }));
}

#[tokio::test(start_paused = true)]
async fn test_delay_waits_and_honours_cancellation() {
    let input = vec![item(json!({ "n": 1 }))];
    let started = tokio::time::Instant::now();
    let out = DelayEffector
        .execute(context(DELAY).with_parameter("delayMs", 250).with_input(input.clone()))
        .await
        .unwrap();
    assert_eq!(out, input);
    assert!(started.elapsed() >= tokio::time::Duration::from_millis(250));

    let ctx = context(DELAY).with_parameter("delayMs", 60_000);
    ctx.cancellation.cancel();
    assert_eq!(DelayEffector.execute(ctx).await.unwrap_err(), NodeError::Cancelled);
}

#[tokio::test]
async fn test_export_stores_binary() {
    let assets = Arc::new(FakeAssets::default());
    let ctx = context(EXPORT)
        .with_services(Services::new().with_assets(assets.clone()))
        .with_parameter("fileName", "{{slug}}.mp4")
        .with_parameter("binaryProperty", "output")
        .with_input(vec![item(json!({ "slug": "owls" })).with_binary("output", clip("final.mp4"))]);

    let out = ExportEffector.execute(ctx).await.unwrap();

    assert_eq!(
        serde_json::Value::Object(out[0].json.clone()),
        json!({ "location": "/exports/owls.mp4", "fileName": "owls.mp4", "mimeType": "video/mp4" })
    );
    assert_eq!(*assets.stored.lock().unwrap(), vec!["owls.mp4"]);
}

#[test]
fn test_every_builtin_kind_has_an_effector() {
    let (catalog, registry) = builtins();

    assert_eq!(catalog.len(), 13);
    for definition in catalog.list() {
        assert!(registry.contains(&definition.kind), "no effector for {}", definition.kind);
        if !definition.is_trigger() {
            assert!(definition.has_input(MAIN_PORT));
            assert!(definition.has_output(weavecore::ERROR_PORT));
        }
    }
    assert_eq!(
        catalog.get_definition(VIDEO_GENERATION).unwrap().default_settings.timeout_seconds,
        900
    );
}

#[tokio::test]
async fn test_builtin_pipeline_end_to_end() {
    let (catalog, registry) = builtins();
    let runtime = Runtime::new(catalog, registry, RuntimeConfig::default());
    let manager = runtime.manager();

    let mut wf = Workflow::new("scenes");
    let position = Default::default();
    let start = manager.add_node(&mut wf, MANUAL_TRIGGER, position, None, None).unwrap();
    let set = manager.add_node(&mut wf, SET, position, None, None).unwrap();
    let split = manager.add_node(&mut wf, SPLIT_OUT, position, None, None).unwrap();
    let keep = manager.add_node(&mut wf, CONDITION, position, None, None).unwrap();
    let debug = manager.add_node(&mut wf, DEBUG, position, None, None).unwrap();

    let configure = |wf: &mut Workflow, id, key: &str, value: serde_json::Value| {
        let node: &mut WorkflowNode = wf.find_node_mut(id).unwrap();
        node.parameters.insert(key.to_string(), value);
    };
    configure(&mut wf, set, "values", json!({ "scenes": [{ "n": 1 }, { "n": 2 }, { "n": 3 }] }));
    configure(&mut wf, split, "field", json!("scenes"));
    configure(&mut wf, keep, "field", json!("n"));
    configure(&mut wf, keep, "operation", json!("greater_than"));
    configure(&mut wf, keep, "value", json!(1));

    for (source, target) in [(start, set), (set, split), (split, keep), (keep, debug)] {
        manager
            .add_connection(&mut wf, source, MAIN_PORT, target, MAIN_PORT)
            .unwrap();
    }

    let execution = runtime.execute(&wf, ExecutionTrigger::Manual, None).await;

    assert!(execution.is_success(), "{:?}", execution.error);
    let result = &execution.data[&debug];
    assert_eq!(result.len(), 2);
    assert_eq!(result[0].json["n"], 2);
}
