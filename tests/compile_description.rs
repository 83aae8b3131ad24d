mod common;

use openapi_gate::compiler::{compile, Location};
use openapi_gate::description::HttpMethod;
use serde_json::json;

#[test]
fn test_petstore_compiles() {
    let compiled = compile(&common::petstore()).unwrap();

    let templates: Vec<_> = compiled.paths.templates().map(|t| t.as_str()).collect();
    assert_eq!(templates, vec!["/uploads", "/pets/mine", "/pets/:petId", "/pets"]);

    let create = compiled.rules.lookup("/pets", HttpMethod::Post).unwrap();
    assert!(create.get(Location::Header).contains_key("x-client-id"));

    let body = create.get(Location::Body);
    assert_eq!(body.keys().collect::<Vec<_>>(), vec!["name", "age", "email"]);
    assert!(body["name"].required);
    assert!(!body["age"].required);
    assert_eq!(body["email"].kind.as_deref(), Some("email"));
}

#[test]
fn test_referenced_parameter_resolved() {
    let compiled = compile(&common::petstore()).unwrap();
    let show = compiled.rules.lookup("/pets/:petId", HttpMethod::Get).unwrap();

    let rule = &show.get(Location::Path)["petId"];
    assert!(rule.required);
    assert_eq!(rule.kind.as_deref(), Some("id"));
}

#[test]
fn test_operations_without_parameters_have_no_rules() {
    let compiled = compile(&common::petstore()).unwrap();
    assert!(compiled.rules.entry("/pets/:petId", HttpMethod::Delete).is_some());
    assert!(compiled.rules.lookup("/pets/:petId", HttpMethod::Delete).is_none());
}

#[test]
fn test_controllers_in_document_order() {
    let compiled = compile(&common::petstore()).unwrap();
    let names: Vec<_> = compiled.controllers.iter().map(|c| c.controller.as_str()).collect();
    assert_eq!(names, vec!["pets.list", "pets.create", "pets.show"]);
}

#[test]
fn test_serialized_rule_table_shape() {
    let compiled = compile(&common::petstore()).unwrap();
    let value = serde_json::to_value(&compiled).unwrap();

    assert_eq!(
        value["rules"]["/pets"]["get"]["query"]["limit"],
        json!({"type": "integer", "required": true, "min": 1, "max": 100})
    );
    assert_eq!(value["rules"]["/pets/:petId"]["delete"], json!(null));
}
