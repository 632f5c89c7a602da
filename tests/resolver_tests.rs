use action_binding::action::{ActionDefinition, FulfillRequest, ParamType, ParamValue, ParameterSpec};
use action_binding::error::RecognizerError;
use action_binding::kernel::{ActionFrame, ActionModel, ActionStatus, Resolver, TurnInput};
use action_binding::recognizer::{Entity, IntentScore, Recognition, Recognizer, ScriptedRecognizer};
use action_binding::{ActionRegistry, ResolveError, ResolverConfig, SwitchPolicy};
use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDate};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn recognized(intent: &str, entities: Vec<Entity>) -> Recognition {
    Recognition::new(vec![IntentScore::new(intent, 0.9)], entities)
}

async fn book(request: FulfillRequest) -> anyhow::Result<Value> {
    Ok(json!(format!(
        "Booked {} on {}",
        request.parameters["city"], request.parameters["date"]
    )))
}

async fn echo(request: FulfillRequest) -> anyhow::Result<Value> {
    Ok(json!({
        "intent": request.intent_name,
        "parent": request.parent_parameters.map(|p| p.keys().cloned().collect::<Vec<_>>()),
        "sub": request.subcontext_result,
    }))
}

async fn location_changed(request: FulfillRequest) -> anyhow::Result<Value> {
    Ok(json!(format!("Location changed to {}", request.parameters["Place"])))
}

fn book_flight() -> ActionDefinition {
    ActionDefinition::from_fn("BookFlight", "Book a flight", book)
        .parameter(ParameterSpec::required("city", ParamType::Text, "Where do you want to fly to?"))
        .parameter(ParameterSpec::required("date", ParamType::Date, "When do you want to fly?"))
}

fn weather() -> ActionDefinition {
    ActionDefinition::from_fn("Weather", "Weather", echo)
        .parameter(ParameterSpec::required("city", ParamType::Text, "Which city?"))
}

fn find_hotels() -> ActionDefinition {
    ActionDefinition::from_fn("FindHotels", "Hotels Search", echo)
        .confirm_on_context_switch(true)
        .parameter(ParameterSpec::required("Place", ParamType::Text, "Please provide a location"))
        .parameter(ParameterSpec::required("Checkin", ParamType::Date, "Please provide the check-in date"))
}

fn change_location() -> ActionDefinition {
    ActionDefinition::from_fn("FindHotels-ChangeLocation", "Change Location", location_changed)
        .contextual_to("FindHotels")
        .can_execute_without_context(true)
        .propagate_to_parent(true)
        .parameter(ParameterSpec::required("Place", ParamType::Text, "Please provide the new location"))
}

fn resolver(actions: Vec<ActionDefinition>, recognizer: ScriptedRecognizer) -> Resolver {
    let registry = ActionRegistry::new(actions).unwrap();
    Resolver::new(Arc::new(registry), Arc::new(recognizer))
}

fn flight_script() -> ScriptedRecognizer {
    ScriptedRecognizer::new()
        .on(
            "book a flight to Paris",
            recognized("BookFlight", vec![Entity::new("city", "Paris")]),
        )
        .on("what's the weather", recognized("Weather", vec![]))
}

#[tokio::test]
async fn test_missing_parameter_is_prompted() {
    let resolver = resolver(vec![book_flight(), weather()], flight_script());

    let model = resolver
        .evaluate(&ActionModel::new(), "book a flight to Paris")
        .await
        .unwrap();

    assert_eq!(model.status, ActionStatus::MissingParameters);
    assert_eq!(model.intent_name.as_deref(), Some("BookFlight"));
    assert_eq!(model.parameters.len(), 1);
    assert_eq!(model.parameters["city"], ParamValue::Text("Paris".into()));
    assert_eq!(model.parameter_errors.len(), 1);
    assert_eq!(model.parameter_errors[0].parameter_name, "date");
    assert_eq!(model.current_parameter.as_deref(), Some("date"));
    assert_eq!(model.prompt(), Some("When do you want to fly?"));
}

#[tokio::test]
async fn test_free_text_answer_fulfills() {
    let resolver = resolver(vec![book_flight(), weather()], flight_script());

    let first = resolver
        .evaluate(&ActionModel::new(), "book a flight to Paris")
        .await
        .unwrap();
    // "tomorrow" is not in the script, so the recognizer returns nothing.
    let second = resolver.evaluate(&first, "tomorrow").await.unwrap();

    let tomorrow = Local::now().date_naive() + Duration::days(1);
    assert_eq!(second.status, ActionStatus::Fulfilled);
    assert_eq!(second.parameters["date"], ParamValue::Date(tomorrow));
    assert!(second.parameter_errors.is_empty());
    assert_eq!(second.current_parameter, None);
    assert_eq!(second.result, Some(json!(format!("Booked Paris on {}", tomorrow))));

    // Previous snapshot is untouched.
    assert_eq!(first.status, ActionStatus::MissingParameters);
}

#[tokio::test]
async fn test_no_action_recognized() {
    let resolver = resolver(vec![book_flight()], flight_script());

    let model = resolver.evaluate(&ActionModel::new(), "sing me a song").await.unwrap();

    assert_eq!(model.status, ActionStatus::NoActionRecognized);
    assert_eq!(model.intent_name, None);
    assert_eq!(model.user_input.as_deref(), Some("sing me a song"));
}

#[tokio::test]
async fn test_intent_below_threshold_is_ignored() {
    let script = ScriptedRecognizer::new().on(
        "maybe paris",
        Recognition::new(
            vec![IntentScore::new("BookFlight", 0.3)],
            vec![Entity::new("city", "Paris")],
        ),
    );
    let config = ResolverConfig {
        intent_threshold: 0.5,
        ..ResolverConfig::default()
    };
    let resolver = resolver(vec![book_flight()], script).with_config(config);

    let model = resolver.evaluate(&ActionModel::new(), "maybe paris").await.unwrap();

    assert_eq!(model.status, ActionStatus::NoActionRecognized);
}

#[tokio::test]
async fn test_inputs_without_effect_leave_model_unchanged() {
    let resolver = resolver(vec![book_flight()], flight_script());
    let empty = ActionModel::new();

    let after_blank = resolver.evaluate(&empty, "   ").await.unwrap();
    assert_eq!(after_blank, empty);

    let after_confirm = resolver.evaluate(&empty, TurnInput::Confirm(true)).await.unwrap();
    assert_eq!(after_confirm, empty);
}

#[tokio::test]
async fn test_utterance_after_fulfillment_starts_new_session() {
    let script = flight_script().on(
        "book a flight to Rome tomorrow",
        recognized(
            "BookFlight",
            vec![Entity::new("city", "Rome"), Entity::new("date", "tomorrow")],
        ),
    );
    let resolver = resolver(vec![book_flight(), weather()], script);

    let done = resolver
        .evaluate(&ActionModel::new(), "book a flight to Rome tomorrow")
        .await
        .unwrap();
    assert_eq!(done.status, ActionStatus::Fulfilled);

    let next = resolver.evaluate(&done, "book a flight to Paris").await.unwrap();
    assert_eq!(next.status, ActionStatus::MissingParameters);
    assert_eq!(next.parameters["city"], ParamValue::Text("Paris".into()));
    assert_eq!(next.result, None);
}

#[tokio::test]
async fn test_child_action_result_reaches_parent() {
    let script = ScriptedRecognizer::new()
        .on(
            "find hotels in madrid",
            recognized("FindHotels", vec![Entity::new("Place", "Madrid")]),
        )
        .on(
            "change location to paris",
            recognized("FindHotels-ChangeLocation", vec![Entity::new("Place", "Paris")]),
        );
    let resolver = resolver(vec![find_hotels(), change_location()], script);

    let searching = resolver
        .evaluate(&ActionModel::new(), "find hotels in madrid")
        .await
        .unwrap();
    assert_eq!(searching.current_parameter.as_deref(), Some("Checkin"));

    let resumed = resolver
        .evaluate(&searching, "change location to paris")
        .await
        .unwrap();

    // 1. Child ran and handed its result back
    assert_eq!(resumed.subcontext_result, Some(json!("Location changed to Paris")));
    // 2. Parent is live again, with the child's place carried over
    assert_eq!(resumed.intent_name.as_deref(), Some("FindHotels"));
    assert_eq!(resumed.status, ActionStatus::MissingParameters);
    assert!(resumed.context_stack.is_empty());
    assert_eq!(resumed.parameters["Place"], ParamValue::Text("Paris".into()));
    assert_eq!(resumed.current_parameter.as_deref(), Some("Checkin"));

    // 3. Answering the parent's prompt completes it
    let done = resolver.evaluate(&resumed, "2031-03-14").await.unwrap();
    assert_eq!(done.status, ActionStatus::Fulfilled);
    assert_eq!(
        done.parameters["Checkin"],
        ParamValue::Date(NaiveDate::from_ymd_opt(2031, 3, 14).unwrap())
    );
    assert_eq!(done.subcontext_result, None);
}

#[tokio::test]
async fn test_parent_fulfills_in_same_turn_as_child() {
    let script = ScriptedRecognizer::new().on(
        "change location to paris",
        recognized("FindHotels-ChangeLocation", vec![Entity::new("Place", "Paris")]),
    );
    let checkin = NaiveDate::from_ymd_opt(2031, 1, 2).unwrap();
    let resolver = resolver(vec![find_hotels(), change_location()], script).with_context_hook(
        move |parent: &ActionDefinition, frame: &mut ActionFrame| {
            assert_eq!(parent.intent_name, "FindHotels");
            frame.parameters.insert("Checkin".into(), ParamValue::Date(checkin));
        },
    );

    let model = resolver
        .evaluate(&ActionModel::new(), "change location to paris")
        .await
        .unwrap();

    assert_eq!(model.status, ActionStatus::Fulfilled);
    assert_eq!(model.intent_name.as_deref(), Some("FindHotels"));
    assert!(model.context_stack.is_empty());
    assert_eq!(
        model.result,
        Some(json!({
            "intent": "FindHotels",
            "parent": null,
            "sub": "Location changed to Paris",
        }))
    );
}

#[tokio::test]
async fn test_cold_contextual_start_synthesizes_parent() {
    let script = ScriptedRecognizer::new().on(
        "change location",
        recognized("FindHotels-ChangeLocation", vec![]),
    );
    let resolver = resolver(vec![find_hotels(), change_location()], script);

    let model = resolver.evaluate(&ActionModel::new(), "change location").await.unwrap();

    assert_eq!(model.status, ActionStatus::MissingParameters);
    assert_eq!(model.intent_name.as_deref(), Some("FindHotels-ChangeLocation"));
    assert_eq!(model.context_stack.len(), 1);
    let parent = model.context_model().unwrap();
    assert_eq!(parent.intent_name, "FindHotels");
    assert!(parent.parameters.is_empty());
}

#[tokio::test]
async fn test_contextual_action_needs_context_unless_allowed() {
    let strict_child = change_location().can_execute_without_context(false);
    let script = ScriptedRecognizer::new().on(
        "change location to paris",
        recognized("FindHotels-ChangeLocation", vec![Entity::new("Place", "Paris")]),
    );
    let resolver = resolver(vec![find_hotels(), strict_child], script);

    let model = resolver
        .evaluate(&ActionModel::new(), "change location to paris")
        .await
        .unwrap();

    assert_eq!(model.status, ActionStatus::NoActionRecognized);
}

#[tokio::test]
async fn test_context_switch_requires_confirmation() {
    let script = ScriptedRecognizer::new()
        .on(
            "find hotels in madrid",
            recognized("FindHotels", vec![Entity::new("Place", "Madrid")]),
        )
        .on(
            "weather in london",
            recognized("Weather", vec![Entity::new("city", "London")]),
        );
    let resolver = resolver(vec![find_hotels(), change_location(), weather()], script);

    let searching = resolver
        .evaluate(&ActionModel::new(), "find hotels in madrid")
        .await
        .unwrap();
    let asking = resolver.evaluate(&searching, "weather in london").await.unwrap();

    // 1. Not switched yet
    assert_eq!(asking.status, ActionStatus::ContextSwitch);
    assert_eq!(asking.intent_name.as_deref(), Some("FindHotels"));
    assert!(asking.parameter_errors.is_empty());
    let staged = asking.context_switch.as_ref().unwrap();
    assert_eq!(staged.intent_name, "Weather");
    assert_eq!(staged.parameters["city"], ParamValue::Text("London".into()));
    assert_eq!(
        asking.prompt(),
        Some("Do you want to discard the current action 'Hotels Search' and start executing 'Weather' action?")
    );

    // 2. Waiting does nothing
    let still = resolver.evaluate(&asking, TurnInput::Continue).await.unwrap();
    assert_eq!(still, asking);

    // 3. "No" resumes the hotel search as it was
    let declined = resolver.evaluate(&asking, false).await.unwrap();
    assert_eq!(declined.status, ActionStatus::MissingParameters);
    assert_eq!(declined.intent_name.as_deref(), Some("FindHotels"));
    assert_eq!(declined.parameters, searching.parameters);
    assert_eq!(declined.parameter_errors, searching.parameter_errors);
    assert_eq!(declined.context_switch, None);

    // 4. "Yes" runs the weather action with its own parameters
    let accepted = resolver.evaluate(&asking, true).await.unwrap();
    assert_eq!(accepted.status, ActionStatus::Fulfilled);
    assert_eq!(accepted.intent_name.as_deref(), Some("Weather"));
    assert!(!accepted.parameters.contains_key("Place"));
    assert_eq!(accepted.context_switch, None);
}

#[tokio::test]
async fn test_confirmed_switch_from_child_discards_parent() {
    let script = ScriptedRecognizer::new()
        .on("change location", recognized("FindHotels-ChangeLocation", vec![]))
        .on(
            "weather in london",
            recognized("Weather", vec![Entity::new("city", "London")]),
        );
    let child = change_location().confirm_on_context_switch(true);
    let resolver = resolver(vec![find_hotels(), child, weather()], script);

    let nested = resolver.evaluate(&ActionModel::new(), "change location").await.unwrap();
    assert_eq!(nested.context_stack.len(), 1);

    let asking = resolver.evaluate(&nested, "weather in london").await.unwrap();
    assert_eq!(asking.status, ActionStatus::ContextSwitch);

    let accepted = resolver.evaluate(&asking, true).await.unwrap();
    assert_eq!(accepted.status, ActionStatus::Fulfilled);
    assert_eq!(accepted.intent_name.as_deref(), Some("Weather"));
    assert!(accepted.context_stack.is_empty());
    assert_eq!(accepted.subcontext_result, None);
}

#[tokio::test]
async fn test_unrelated_answer_declines_pending_switch() {
    let script = ScriptedRecognizer::new()
        .on(
            "find hotels in madrid",
            recognized("FindHotels", vec![Entity::new("Place", "Madrid")]),
        )
        .on("what's the weather", recognized("Weather", vec![]));
    let resolver = resolver(vec![find_hotels(), weather()], script);

    let searching = resolver
        .evaluate(&ActionModel::new(), "find hotels in madrid")
        .await
        .unwrap();
    let asking = resolver.evaluate(&searching, "what's the weather").await.unwrap();
    assert_eq!(asking.status, ActionStatus::ContextSwitch);

    let answered = resolver.evaluate(&asking, "2031-05-06").await.unwrap();

    assert_eq!(answered.status, ActionStatus::Fulfilled);
    assert_eq!(answered.intent_name.as_deref(), Some("FindHotels"));
}

#[tokio::test]
async fn test_unconfirmed_switch_is_immediate_by_default() {
    let resolver = resolver(vec![book_flight(), weather()], flight_script());

    let booking = resolver
        .evaluate(&ActionModel::new(), "book a flight to Paris")
        .await
        .unwrap();
    let switched = resolver.evaluate(&booking, "what's the weather").await.unwrap();

    // City carries over because the weather action declares it too.
    assert_eq!(switched.status, ActionStatus::Fulfilled);
    assert_eq!(switched.intent_name.as_deref(), Some("Weather"));
    assert_eq!(switched.parameters["city"], ParamValue::Text("Paris".into()));
    assert!(!switched.parameters.contains_key("date"));
}

#[tokio::test]
async fn test_immediate_switch_keeps_undeclared_parameters() {
    let forecast = ActionDefinition::from_fn("Forecast", "Forecast", echo)
        .parameter(ParameterSpec::required("place", ParamType::Text, "Where?"));
    let script = flight_script().on(
        "weather in rome",
        recognized("Forecast", vec![Entity::new("place", "Rome")]),
    );
    let resolver = resolver(vec![book_flight(), forecast], script);

    let booking = resolver
        .evaluate(&ActionModel::new(), "book a flight to Paris")
        .await
        .unwrap();
    let switched = resolver.evaluate(&booking, "weather in rome").await.unwrap();

    assert_eq!(switched.status, ActionStatus::Fulfilled);
    assert_eq!(switched.intent_name.as_deref(), Some("Forecast"));
    assert_eq!(switched.parameters["place"], ParamValue::Text("Rome".into()));
    // Old value the new action does not declare is still there.
    assert_eq!(switched.parameters["city"], ParamValue::Text("Paris".into()));
}

#[tokio::test]
async fn test_switch_policy_confirm_stages_switch() {
    let config = ResolverConfig {
        unconfirmed_switch: SwitchPolicy::Confirm,
        ..ResolverConfig::default()
    };
    let resolver = resolver(vec![book_flight(), weather()], flight_script()).with_config(config);

    let booking = resolver
        .evaluate(&ActionModel::new(), "book a flight to Paris")
        .await
        .unwrap();
    let asking = resolver.evaluate(&booking, "what's the weather").await.unwrap();

    assert_eq!(asking.status, ActionStatus::ContextSwitch);
    assert_eq!(asking.context_switch.as_ref().unwrap().intent_name, "Weather");
}

#[tokio::test]
async fn test_switch_policy_ignore_keeps_current_action() {
    let config = ResolverConfig {
        unconfirmed_switch: SwitchPolicy::Ignore,
        ..ResolverConfig::default()
    };
    let resolver = resolver(vec![book_flight(), weather()], flight_script()).with_config(config);

    let booking = resolver
        .evaluate(&ActionModel::new(), "book a flight to Paris")
        .await
        .unwrap();
    let ignored = resolver.evaluate(&booking, "what's the weather").await.unwrap();

    assert_eq!(ignored.status, ActionStatus::MissingParameters);
    assert_eq!(ignored.intent_name.as_deref(), Some("BookFlight"));
    assert_eq!(ignored.current_parameter.as_deref(), Some("date"));
    assert_eq!(ignored.parameters["city"], ParamValue::Text("Paris".into()));
}

#[tokio::test]
async fn test_fulfillment_error_propagates() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let failing = ActionDefinition::from_fn("Weather", "Weather", move |_request: FulfillRequest| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<Value, _>(anyhow::anyhow!("weather service down"))
        }
    })
    .parameter(ParameterSpec::required("city", ParamType::Text, "Which city?"));

    let script = ScriptedRecognizer::new().on(
        "weather in oslo",
        recognized("Weather", vec![Entity::new("city", "Oslo")]),
    );
    let resolver = resolver(vec![failing], script);

    let err = resolver
        .evaluate(&ActionModel::new(), "weather in oslo")
        .await
        .unwrap_err();

    match err {
        ResolveError::Fulfillment { intent, source } => {
            assert_eq!(intent, "Weather");
            assert_eq!(source.to_string(), "weather service down");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

struct UnavailableRecognizer;

#[async_trait]
impl Recognizer for UnavailableRecognizer {
    async fn recognize(&self, _utterance: &str) -> Result<Recognition, RecognizerError> {
        Err(RecognizerError::Status {
            status: 503,
            body: "unavailable".into(),
        })
    }
}

#[tokio::test]
async fn test_recognizer_error_fails_the_turn() {
    let registry = ActionRegistry::new(vec![book_flight()]).unwrap();
    let resolver = Resolver::new(Arc::new(registry), Arc::new(UnavailableRecognizer));

    let err = resolver
        .evaluate(&ActionModel::new(), "book a flight")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ResolveError::Recognizer(RecognizerError::Status { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_context_depth_is_bounded() {
    let trip = ActionDefinition::from_fn("Trip", "Trip", echo)
        .parameter(ParameterSpec::required("name", ParamType::Text, "Name the trip"));
    let leg = ActionDefinition::from_fn("Trip-Leg", "Leg", echo)
        .contextual_to("Trip")
        .can_execute_without_context(true)
        .parameter(ParameterSpec::required("from", ParamType::Text, "From where?"));
    let stop = ActionDefinition::from_fn("Trip-Leg-Stop", "Stop", echo)
        .contextual_to("Trip-Leg")
        .can_execute_without_context(true)
        .parameter(ParameterSpec::required("at", ParamType::Text, "Stop where?"));

    let script = ScriptedRecognizer::new().on("add a stop", recognized("Trip-Leg-Stop", vec![]));
    let registry = Arc::new(ActionRegistry::new(vec![trip, leg, stop]).unwrap());

    let shallow = Resolver::new(registry.clone(), Arc::new(script.clone())).with_config(ResolverConfig {
        max_context_depth: 1,
        ..ResolverConfig::default()
    });
    let err = shallow
        .evaluate(&ActionModel::new(), "add a stop")
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::ContextDepthExceeded { depth: 1 }));

    let deep = Resolver::new(registry, Arc::new(script));
    let model = deep.evaluate(&ActionModel::new(), "add a stop").await.unwrap();
    let chain: Vec<&str> = model.context_stack.iter().map(|f| f.intent_name.as_str()).collect();
    assert_eq!(chain, vec!["Trip", "Trip-Leg"]);
}

#[tokio::test]
async fn test_model_survives_persistence_between_turns() {
    let script = ScriptedRecognizer::new()
        .on(
            "find hotels in madrid",
            recognized("FindHotels", vec![Entity::new("Place", "Madrid")]),
        )
        .on("change location", recognized("FindHotels-ChangeLocation", vec![]));
    let resolver = resolver(vec![find_hotels(), change_location()], script);

    let searching = resolver
        .evaluate(&ActionModel::new(), "find hotels in madrid")
        .await
        .unwrap();
    let nested = resolver.evaluate(&searching, "change location").await.unwrap();
    assert_eq!(nested.context_stack.len(), 1);
    assert_eq!(nested.current_parameter.as_deref(), Some("Place"));

    let stored = nested.to_json().unwrap();
    let restored = ActionModel::from_json(&stored).unwrap();
    assert_eq!(restored, nested);

    let resumed = resolver.evaluate(&restored, "Lisbon").await.unwrap();
    assert_eq!(resumed.intent_name.as_deref(), Some("FindHotels"));
    assert_eq!(resumed.parameters["Place"], ParamValue::Text("Lisbon".into()));
    assert_eq!(resumed.subcontext_result, Some(json!("Location changed to Lisbon")));
}
