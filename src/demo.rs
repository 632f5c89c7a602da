use anyhow::{bail, Context};
use chrono::Utc;
use serde_json::{json, Value};

use action_binding::action::{ActionDefinition, FulfillRequest, ParamType, ParamValue, ParameterSpec, Validator};
use action_binding::binder::builtin;

pub const TIME_IN_PLACE: &str = "WhatTimeIsIt";
pub const FIND_HOTELS: &str = "FindHotels";
pub const CHANGE_LOCATION: &str = "FindHotels-ChangeLocation";
pub const CHANGE_CHECKIN: &str = "FindHotels-ChangeCheckin";
pub const WEATHER: &str = "WeatherInPlace";
pub const FIND_AIRPORT: &str = "FindAirportByCode";

/// Sample actions for the console driver.
pub fn actions() -> Vec<ActionDefinition> {
    vec![
        ActionDefinition::from_fn(TIME_IN_PLACE, "What's the time?", time_in_place).parameter(
            ParameterSpec::required("Place", ParamType::Text, "Please provide a location")
                .builtin_entity(builtin::GEOGRAPHY_CITY),
        ),
        ActionDefinition::from_fn(FIND_HOTELS, "Hotels Search", find_hotels)
            .confirm_on_context_switch(true)
            .parameter(
                ParameterSpec::required("Place", ParamType::Text, "Please provide a location")
                    .builtin_entity(builtin::GEOGRAPHY_CITY),
            )
            .parameter(
                ParameterSpec::required("Checkin", ParamType::Date, "Please provide the check-in date")
                    .builtin_entity(builtin::DATETIME_V2_DATE),
            )
            .parameter(
                ParameterSpec::required("Checkout", ParamType::Date, "Please provide the check-out date")
                    .builtin_entity(builtin::DATETIME_V2_DATE),
            )
            .parameter(
                ParameterSpec::optional(
                    "Category",
                    ParamType::enumeration(["economy", "standard", "luxury"]),
                )
                .custom_entity("Hotel.Category"),
            ),
        ActionDefinition::from_fn(CHANGE_LOCATION, "Change Hotel Location", change_location)
            .contextual_to(FIND_HOTELS)
            .can_execute_without_context(true)
            .propagate_to_parent(true)
            .parameter(
                ParameterSpec::required("Place", ParamType::Text, "Please provide the new location")
                    .builtin_entity(builtin::GEOGRAPHY_CITY),
            ),
        ActionDefinition::from_fn(CHANGE_CHECKIN, "Change Hotel Check-in", change_checkin)
            .contextual_to(FIND_HOTELS)
            .can_execute_without_context(true)
            .propagate_to_parent(true)
            .parameter(
                ParameterSpec::required("Checkin", ParamType::Date, "Please provide the new check-in date")
                    .builtin_entity(builtin::DATETIME_V2_DATE),
            ),
        ActionDefinition::from_fn(WEATHER, "Weather in Place", weather).parameter(
            ParameterSpec::required("Place", ParamType::Text, "Please provide a location")
                .builtin_entity(builtin::GEOGRAPHY_CITY),
        ),
        ActionDefinition::from_fn(FIND_AIRPORT, "Airport Information", find_airport).parameter(
            ParameterSpec::required("Code", ParamType::Text, "Please provide the airport code")
                .custom_entity("AirportCode")
                .validator(Validator::new("three letters", |value| {
                    value
                        .as_text()
                        .map(|code| code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()))
                        .unwrap_or(false)
                })),
        ),
    ]
}

fn text(request: &FulfillRequest, name: &str) -> anyhow::Result<String> {
    request
        .parameters
        .get(name)
        .map(ToString::to_string)
        .with_context(|| format!("missing parameter '{name}'"))
}

async fn time_in_place(request: FulfillRequest) -> anyhow::Result<Value> {
    let place = text(&request, "Place")?;
    let now = Utc::now().format("%H:%M");
    Ok(json!(format!("It's {now} (UTC) in {place}.")))
}

async fn find_hotels(request: FulfillRequest) -> anyhow::Result<Value> {
    let place = text(&request, "Place")?;
    let (Some(checkin), Some(checkout)) = (
        request.parameters.get("Checkin").and_then(ParamValue::as_date),
        request.parameters.get("Checkout").and_then(ParamValue::as_date),
    ) else {
        bail!("check-in and check-out must be dates");
    };

    if checkout <= checkin {
        return Ok(json!(format!(
            "Check-out ({checkout}) must be after check-in ({checkin}) for {place}."
        )));
    }

    let category = request
        .parameters
        .get("Category")
        .map(ToString::to_string)
        .unwrap_or_else(|| "any".to_string());

    let mut message = format!(
        "Found 5 {category} hotels in {place} from {checkin} to {checkout} ({} nights).",
        (checkout - checkin).num_days()
    );
    if let Some(change) = request.subcontext_result.as_ref().and_then(Value::as_str) {
        message = format!("{change} {message}");
    }
    Ok(json!(message))
}

async fn change_location(request: FulfillRequest) -> anyhow::Result<Value> {
    let place = text(&request, "Place")?;
    Ok(json!(format!("Hotel location changed to {place}.")))
}

async fn change_checkin(request: FulfillRequest) -> anyhow::Result<Value> {
    let checkin = request
        .parameters
        .get("Checkin")
        .and_then(ParamValue::as_date)
        .context("check-in must be a date")?;

    let checkout = request
        .parent_parameters
        .as_ref()
        .and_then(|parent| parent.get("Checkout"))
        .and_then(ParamValue::as_date);

    Ok(match checkout {
        Some(checkout) if checkout <= checkin => json!(format!(
            "Hotel check-in changed to {checkin}, which is not before the check-out ({checkout})."
        )),
        _ => json!(format!("Hotel check-in changed to {checkin}.")),
    })
}

async fn weather(request: FulfillRequest) -> anyhow::Result<Value> {
    let place = text(&request, "Place")?;
    Ok(json!(format!("It's sunny in {place}, 24°C.")))
}

async fn find_airport(request: FulfillRequest) -> anyhow::Result<Value> {
    let code = text(&request, "Code")?.to_uppercase();
    Ok(json!({ "code": code, "message": format!("Looking up airport {code}.") }))
}
