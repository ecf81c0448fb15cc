use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::json;

use super::{Context, Format, Serializer, SerializerBuilder};
use crate::Error;
use crate::config::SerializerConfig;
use crate::data::{Data, OpaqueValue, Typed, Value};
use crate::derive::Mapped;
use crate::handler::Direction;
use crate::info::{ClassId, Version};
use crate::metadata::FileCache;
use crate::naming::IdenticalNaming;
use crate::visitor::{InputNode, Scalar, XmlOptions};

// -----------------------------------------------------------------------------
// Model

#[derive(Mapped, Debug, PartialEq, Clone)]
#[serial(class = "test::Address", xml_root = "address")]
struct Address {
    street: String,
    zip_code: String,
}

#[derive(Mapped, Debug, PartialEq, Clone)]
#[serial(class = "test::User", xml_root = "user")]
#[allow(non_snake_case)]
struct User {
    id: u64,
    #[serial(rename = "login")]
    name: String,
    birthDate: NaiveDate,
    email: Option<String>,
    tags: Vec<String>,
    address: Option<Address>,
}

fn ada() -> User {
    User {
        id: 7,
        name: "ada".into(),
        birthDate: NaiveDate::from_ymd_opt(1815, 12, 10).unwrap(),
        email: None,
        tags: vec!["math".into(), "poetry".into()],
        address: Some(Address {
            street: "St James Square".into(),
            zip_code: "SW1".into(),
        }),
    }
}

fn serializer() -> Serializer {
    Serializer::builder()
        .xml_options(XmlOptions {
            format_output: false,
            ..XmlOptions::default()
        })
        .build()
        .unwrap()
}

fn to_json<T: Data + Typed>(serializer: &Serializer, value: &T, context: &Context) -> serde_json::Value {
    let bytes = serializer.serialize(value, Format::Json, context).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// -----------------------------------------------------------------------------
// JSON

#[test]
fn json_applies_naming_and_omits_nulls() {
    let serializer = serializer();
    let text = serializer.to_string(&ada(), Format::Json, &Context::new()).unwrap();

    assert_eq!(
        text,
        r#"{"id":7,"login":"ada","birth_date":"1815-12-10","tags":["math","poetry"],"address":{"street":"St James Square","zip_code":"SW1"}}"#
    );
}

#[test]
fn json_writes_nulls_on_request() {
    let serializer = serializer();
    let user = User { address: None, ..ada() };
    let value = to_json(&serializer, &user, &Context::new().serialize_null(true));

    assert_eq!(value["email"], json!(null));
    assert_eq!(value["address"], json!(null));
}

#[test]
fn json_round_trip() {
    let serializer = serializer();
    let user = User {
        email: Some("ada@example.org".into()),
        ..ada()
    };
    let bytes = serializer.serialize(&user, Format::Json, &Context::new()).unwrap();
    let back: User = serializer.deserialize(&bytes, Format::Json, &Context::new()).unwrap();
    assert_eq!(back, user);
}

#[test]
fn json_absent_optional_fields_become_none() {
    let serializer = serializer();
    let input = br#"{"id":1,"login":"bob","birth_date":"2000-01-31","tags":[]}"#;
    let user: User = serializer.deserialize(input, Format::Json, &Context::new()).unwrap();

    assert_eq!(user.email, None);
    assert_eq!(user.address, None);
    assert!(user.tags.is_empty());
}

#[derive(Mapped, Debug, PartialEq)]
#[serial(class = "test::Person")]
#[allow(non_snake_case)]
struct Person {
    name: String,
    birthDate: NaiveDate,
}

#[test]
fn camel_case_properties_become_snake_case() {
    let serializer = serializer();
    let ada = Person {
        name: "Ada".into(),
        birthDate: NaiveDate::from_ymd_opt(1815, 12, 10).unwrap(),
    };

    let text = serializer.to_string(&ada, Format::Json, &Context::new()).unwrap();
    assert_eq!(text, r#"{"name":"Ada","birth_date":"1815-12-10"}"#);
}

#[test]
fn json_null_required_field_is_a_mismatch() {
    let serializer = serializer();
    let input = br#"{"id":null,"login":"bob","birth_date":"2000-01-31","tags":[]}"#;
    let err = serializer.deserialize::<User>(input, Format::Json, &Context::new()).unwrap_err();

    assert!(matches!(err, Error::TypeMismatch { .. }));
    assert_eq!(err.path(), Some("$.id"));
}

// -----------------------------------------------------------------------------
// Errors

#[test]
fn missing_required_field_reports_serialized_name() {
    let serializer = serializer();
    let input = br#"{"id":1,"birth_date":"2000-01-31","tags":[]}"#;
    let err = serializer.deserialize::<User>(input, Format::Json, &Context::new()).unwrap_err();

    match err {
        Error::MissingField { field, path } => {
            assert_eq!(field, "login");
            assert_eq!(path, "$");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn missing_nested_field_reports_nested_path() {
    let serializer = serializer();
    let input = br#"{"id":1,"login":"bob","birth_date":"2000-01-31","tags":[],"address":{"zip_code":"75001"}}"#;
    let err = serializer.deserialize::<User>(input, Format::Json, &Context::new()).unwrap_err();

    match err {
        Error::MissingField { field, path } => {
            assert_eq!(field, "street");
            assert_eq!(path, "$.address");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn strings_do_not_convert_to_numbers() {
    let serializer = serializer();
    let input = br#"{"id":"7","login":"bob","birth_date":"2000-01-31","tags":[]}"#;
    let err = serializer.deserialize::<User>(input, Format::Json, &Context::new()).unwrap_err();

    match err {
        Error::TypeMismatch { path, expected, found } => {
            assert_eq!(path, "$.id");
            assert_eq!(expected, "u64");
            assert_eq!(found, "string");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn negative_values_do_not_fit_unsigned_fields() {
    let serializer = serializer();
    let input = br#"{"id":-1,"login":"bob","birth_date":"2000-01-31","tags":[]}"#;
    let err = serializer.deserialize::<User>(input, Format::Json, &Context::new()).unwrap_err();

    assert!(matches!(err, Error::TypeMismatch { .. }));
    assert_eq!(err.path(), Some("$.id"));
}

#[test]
fn wrong_element_type_reports_index() {
    let serializer = serializer();
    let input = br#"{"id":1,"login":"bob","birth_date":"2000-01-31","tags":["a",2]}"#;
    let err = serializer.deserialize::<User>(input, Format::Json, &Context::new()).unwrap_err();

    assert_eq!(err.path(), Some("$.tags[1]"));
}

#[test]
fn unknown_fields_are_ignored_unless_strict() {
    let serializer = serializer();
    let input = br#"{"id":1,"login":"bob","birth_date":"2000-01-31","tags":[],"nickname":"b"}"#;

    let user: User = serializer.deserialize(input, Format::Json, &Context::new()).unwrap();
    assert_eq!(user.name, "bob");

    let err = serializer
        .deserialize::<User>(input, Format::Json, &Context::new().strict(true))
        .unwrap_err();
    match err {
        Error::UnknownField { field, path } => {
            assert_eq!(field, "nickname");
            assert_eq!(path, "$");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn malformed_json_is_a_syntax_error() {
    let serializer = serializer();
    let err = serializer
        .deserialize::<User>(b"{\"id\":", Format::Json, &Context::new())
        .unwrap_err();
    assert!(matches!(err, Error::Syntax { format: Format::Json, .. }));
}

// -----------------------------------------------------------------------------
// Cycles

#[derive(Mapped)]
#[serial(class = "test::Node")]
struct Node {
    name: String,
    next: Option<Arc<RwLock<Node>>>,
}

fn node(name: &str) -> Arc<RwLock<Node>> {
    Arc::new(RwLock::new(Node {
        name: name.into(),
        next: None,
    }))
}

#[test]
fn cycles_are_rejected_with_their_path() {
    let serializer = serializer();
    let first = node("a");
    let second = node("b");
    second.write().unwrap().next = Some(first.clone());
    first.write().unwrap().next = Some(second.clone());

    let err = serializer.serialize(&first, Format::Json, &Context::new()).unwrap_err();
    // Break the cycle so both nodes are dropped.
    second.write().unwrap().next = None;

    match err {
        Error::CyclicReference { class, path } => {
            assert_eq!(class, "test::Node");
            assert_eq!(path, "$.next.next");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[derive(Mapped)]
#[serial(class = "test::Team")]
struct Team {
    lead: Arc<RwLock<Node>>,
    members: Vec<Arc<RwLock<Node>>>,
}

#[test]
fn shared_nodes_off_the_current_path_are_written_again() {
    let serializer = serializer();
    let lead = node("a");
    let team = Team {
        lead: lead.clone(),
        members: vec![lead.clone(), node("b")],
    };

    let value = to_json(&serializer, &team, &Context::new());
    assert_eq!(
        value,
        json!({
            "lead": { "name": "a" },
            "members": [{ "name": "a" }, { "name": "b" }],
        })
    );
}

// -----------------------------------------------------------------------------
// Exclusion

#[derive(Mapped, Debug, PartialEq, Default)]
#[serial(class = "test::Profile")]
struct Profile {
    name: String,
    #[serial(groups("details"))]
    bio: Option<String>,
    #[serial(since = "2.0")]
    avatar: Option<String>,
    #[serial(read_only, default)]
    score: u32,
    #[serial(skip)]
    cache: Vec<u8>,
}

fn profile() -> Profile {
    Profile {
        name: "a".into(),
        bio: Some("b".into()),
        avatar: Some("c".into()),
        score: 3,
        cache: vec![1, 2, 3],
    }
}

#[test]
fn groups_select_properties() {
    let serializer = serializer();

    let all = to_json(&serializer, &profile(), &Context::new());
    assert_eq!(all, json!({ "name": "a", "bio": "b", "avatar": "c", "score": 3 }));

    let default = to_json(&serializer, &profile(), &Context::new().with_groups(["Default"]));
    assert_eq!(default, json!({ "name": "a", "avatar": "c", "score": 3 }));

    let details = to_json(&serializer, &profile(), &Context::new().with_groups(["details"]));
    assert_eq!(details, json!({ "bio": "b" }));

    let excluded = to_json(&serializer, &profile(), &Context::new().with_exclude_groups(["details"]));
    assert_eq!(excluded, json!({ "name": "a", "avatar": "c", "score": 3 }));
}

#[test]
fn versions_select_properties() {
    let serializer = serializer();

    let old = Context::new().with_version("1.5".parse::<Version>().unwrap());
    assert_eq!(
        to_json(&serializer, &profile(), &old),
        json!({ "name": "a", "bio": "b", "score": 3 })
    );

    let new = Context::new().with_version("2.0".parse::<Version>().unwrap());
    assert_eq!(to_json(&serializer, &profile(), &new)["avatar"], json!("c"));
}

#[test]
fn read_only_and_skipped_fields_are_not_read() {
    let serializer = serializer();
    let input = br#"{"name":"a","score":9}"#;
    let profile: Profile = serializer
        .deserialize(input, Format::Json, &Context::new().strict(true))
        .unwrap();

    assert_eq!(profile, Profile { name: "a".into(), ..Profile::default() });
}

// -----------------------------------------------------------------------------
// Inline

#[derive(Mapped, Debug, PartialEq)]
#[serial(class = "test::Audit")]
struct Audit {
    created_by: String,
    revision: u32,
}

#[derive(Mapped, Debug, PartialEq)]
#[serial(class = "test::Page")]
struct Page {
    id: u64,
    #[serial(inline)]
    audit: Audit,
}

#[test]
fn inline_properties_flatten_into_the_parent() {
    let serializer = serializer();
    let page = Page {
        id: 1,
        audit: Audit {
            created_by: "ada".into(),
            revision: 3,
        },
    };

    let text = serializer.to_string(&page, Format::Json, &Context::new()).unwrap();
    assert_eq!(text, r#"{"id":1,"created_by":"ada","revision":3}"#);

    let back: Page = serializer
        .deserialize(text.as_bytes(), Format::Json, &Context::new().strict(true))
        .unwrap();
    assert_eq!(back, page);
}

#[derive(Debug, Mapped)]
#[serial(class = "test::Revision")]
struct Revision {
    id: u64,
}

#[derive(Debug, Mapped)]
#[serial(class = "test::Draft")]
struct Draft {
    id: u64,
    #[serial(inline)]
    revision: Revision,
}

#[test]
fn inline_keys_must_not_clash_with_the_parent() {
    let serializer = serializer();
    let draft = Draft {
        id: 1,
        revision: Revision { id: 2 },
    };

    let err = serializer.to_string(&draft, Format::Json, &Context::new()).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "{err:?}");

    let err = serializer
        .deserialize::<Draft>(br#"{"id":2}"#, Format::Json, &Context::new())
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "{err:?}");
}

// -----------------------------------------------------------------------------
// Polymorphism

#[derive(Mapped, Debug, PartialEq)]
#[serial(class = "test::Circle")]
struct Circle {
    radius: f64,
}

#[derive(Mapped, Debug, PartialEq)]
#[serial(class = "test::Square")]
struct Square {
    side: f64,
}

#[derive(Mapped, Debug, PartialEq)]
#[serial(class = "test::Shape", discriminator = "kind")]
enum Shape {
    #[serial(tag = "circle")]
    Circle(Circle),
    #[serial(tag = "square")]
    Square(Square),
}

#[derive(Mapped, Debug, PartialEq)]
#[serial(class = "test::Drawing")]
struct Drawing {
    shapes: Vec<Shape>,
}

#[test]
fn discriminator_round_trip() {
    let serializer = serializer();
    let drawing = Drawing {
        shapes: vec![
            Shape::Circle(Circle { radius: 1.5 }),
            Shape::Square(Square { side: 2.0 }),
        ],
    };

    let text = serializer.to_string(&drawing, Format::Json, &Context::new()).unwrap();
    assert_eq!(
        text,
        r#"{"shapes":[{"kind":"circle","radius":1.5},{"kind":"square","side":2.0}]}"#
    );

    let back: Drawing = serializer.deserialize(text.as_bytes(), Format::Json, &Context::new()).unwrap();
    assert_eq!(back, drawing);
}

#[test]
fn discriminator_tag_is_required_and_must_be_known() {
    let serializer = serializer();

    let err = serializer
        .deserialize::<Drawing>(br#"{"shapes":[{"radius":1}]}"#, Format::Json, &Context::new())
        .unwrap_err();
    match err {
        Error::MissingField { field, path } => {
            assert_eq!(field, "kind");
            assert_eq!(path, "$.shapes[0]");
        }
        other => panic!("unexpected error {other:?}"),
    }

    let err = serializer
        .deserialize::<Drawing>(br#"{"shapes":[{"kind":"hexagon"}]}"#, Format::Json, &Context::new())
        .unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));
    assert_eq!(err.path(), Some("$.shapes[0]"));
}

#[test]
fn integers_widen_to_floats() {
    let serializer = serializer();
    let drawing: Drawing = serializer
        .deserialize(br#"{"shapes":[{"kind":"square","side":3}]}"#, Format::Json, &Context::new())
        .unwrap();
    assert_eq!(drawing.shapes, [Shape::Square(Square { side: 3.0 })]);
}

// -----------------------------------------------------------------------------
// XML

#[derive(Mapped, Debug, PartialEq)]
#[serial(class = "test::Book", xml_root = "book")]
struct Book {
    #[serial(xml_attribute)]
    isbn: String,
    #[serial(xml_list(entry = "author", inline))]
    authors: Vec<String>,
    #[serial(xml_map(entry = "rating", key = "site"))]
    ratings: BTreeMap<String, u8>,
    #[serial(xml_cdata)]
    summary: String,
}

fn book() -> Book {
    Book {
        isbn: "978-0".into(),
        authors: vec!["Ann".into(), "Bob".into()],
        ratings: BTreeMap::from([("a".to_owned(), 4), ("b".to_owned(), 5)]),
        summary: "x < y".into(),
    }
}

#[test]
fn xml_attributes_collections_and_cdata() {
    let serializer = serializer();
    let xml = serializer.to_string(&book(), Format::Xml, &Context::new()).unwrap();

    assert_eq!(
        xml,
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<book isbn="978-0">"#,
            "<author>Ann</author><author>Bob</author>",
            r#"<ratings><rating site="a">4</rating><rating site="b">5</rating></ratings>"#,
            "<summary><![CDATA[x < y]]></summary>",
            "</book>",
        )
    );
}

#[test]
fn xml_round_trip() {
    let serializer = serializer();

    let xml = serializer.serialize(&book(), Format::Xml, &Context::new()).unwrap();
    let back: Book = serializer.deserialize(&xml, Format::Xml, &Context::new().strict(true)).unwrap();
    assert_eq!(back, book());

    let xml = serializer.serialize(&ada(), Format::Xml, &Context::new()).unwrap();
    let back: User = serializer.deserialize(&xml, Format::Xml, &Context::new()).unwrap();
    assert_eq!(back, ada());
}

#[derive(Mapped, Debug, PartialEq)]
#[serial(class = "test::Padded", xml_root = "padded")]
struct Padded {
    text: String,
    letter: char,
    lines: Vec<String>,
}

#[test]
fn xml_keeps_leaf_whitespace() {
    let padded = Padded {
        text: "  two spaces ".into(),
        letter: ' ',
        lines: vec!["\tindented".into(), "trailing\n".into()],
    };

    for format_output in [false, true] {
        let serializer = Serializer::builder()
            .xml_options(XmlOptions {
                format_output,
                ..XmlOptions::default()
            })
            .build()
            .unwrap();
        let xml = serializer.serialize(&padded, Format::Xml, &Context::new()).unwrap();
        let text = String::from_utf8(xml.clone()).unwrap();
        assert!(text.contains("<text>  two spaces </text>"), "{text}");
        assert!(text.contains("<letter> </letter>"), "{text}");

        let back: Padded = serializer
            .deserialize(&xml, Format::Xml, &Context::new().strict(true))
            .unwrap();
        assert_eq!(back, padded, "format_output = {format_output}");
    }
}

#[derive(Mapped, Debug, PartialEq)]
#[serial(class = "test::Account", xml_root = "user")]
struct Account {
    id: u64,
    email: Option<String>,
}

#[test]
fn xml_absent_fields_take_their_default() {
    let serializer = serializer();
    let account: Account = serializer
        .deserialize(b"<user><id>7</id></user>", Format::Xml, &Context::new())
        .unwrap();
    assert_eq!(account, Account { id: 7, email: None });
}

#[test]
fn xml_default_collections_use_entry_elements() {
    let serializer = serializer();
    let xml = serializer.to_string(&ada(), Format::Xml, &Context::new()).unwrap();

    assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?><user>"#));
    assert!(xml.contains("<tags><entry>math</entry><entry>poetry</entry></tags>"));
    assert!(xml.contains("<birth_date>1815-12-10</birth_date>"));
}

#[test]
fn xml_rejects_unlisted_doctypes() {
    let serializer = serializer();
    let input = br#"<!DOCTYPE book SYSTEM "book.dtd"><book isbn="1"><ratings/><summary>s</summary></book>"#;
    let err = serializer
        .deserialize::<Book>(input, Format::Xml, &Context::new())
        .unwrap_err();
    assert!(matches!(err, Error::DisallowedDoctype(_)));

    let permissive = Serializer::builder()
        .xml_options(XmlOptions {
            doctype_whitelist: vec![r#"book SYSTEM "book.dtd""#.into()],
            ..XmlOptions::default()
        })
        .build()
        .unwrap();
    let book: Book = permissive.deserialize(input, Format::Xml, &Context::new()).unwrap();
    assert_eq!(book.isbn, "1");
    assert!(book.authors.is_empty());
}

// -----------------------------------------------------------------------------
// Events

#[test]
fn serialize_events_wrap_every_object() {
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let (pre, post) = (seen.clone(), seen.clone());
    let serializer = Serializer::builder()
        .configure_events(|events| {
            events
                .on_pre_serialize(None, move |event, _| {
                    pre.lock().unwrap().push(format!("pre {} {}", event.class(), event.path()));
                    Ok(())
                })
                .on_post_serialize(None, move |event, _| {
                    post.lock().unwrap().push(format!("post {} {}", event.class(), event.path()));
                    Ok(())
                });
        })
        .build()
        .unwrap();

    serializer.serialize(&ada(), Format::Json, &Context::new()).unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        [
            "pre test::User $",
            "pre test::Address $.address",
            "post test::Address $.address",
            "post test::User $",
        ]
    );

    seen.lock().unwrap().clear();
    let page = Page {
        id: 1,
        audit: Audit {
            created_by: "ada".into(),
            revision: 3,
        },
    };
    serializer.serialize(&page, Format::Xml, &Context::new()).unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        [
            "pre test::Page $",
            "pre test::Audit $.audit",
            "post test::Audit $.audit",
            "post test::Page $",
        ]
    );
}

#[test]
fn post_deserialize_listeners_edit_objects() {
    let serializer = Serializer::builder()
        .configure_events(|events| {
            events.on_post_deserialize(Some(ClassId::from_static("test::Address")), |_, object| {
                if let Some(Value::String(zip)) = object.take("zip_code") {
                    object.insert("zip_code", Value::String(zip.to_uppercase()));
                }
                Ok(())
            });
        })
        .build()
        .unwrap();

    let input = br#"{"id":1,"login":"bob","birth_date":"2000-01-31","tags":[],"address":{"street":"a","zip_code":"sw1"}}"#;
    let user: User = serializer.deserialize(input, Format::Json, &Context::new()).unwrap();
    assert_eq!(user.address.unwrap().zip_code, "SW1");
}

#[test]
fn listener_errors_abort_the_call() {
    let serializer = Serializer::builder()
        .configure_events(|events| {
            events.on_pre_serialize(Some(ClassId::from_static("test::Address")), |event, _| {
                Err(Error::configuration(format!("no addresses at {}", event.path())))
            });
        })
        .build()
        .unwrap();

    let err = serializer.serialize(&ada(), Format::Json, &Context::new()).unwrap_err();
    assert!(matches!(err, Error::Configuration(ref message) if message == "no addresses at $.address"));

    let user = User { address: None, ..ada() };
    assert!(serializer.serialize(&user, Format::Json, &Context::new()).is_ok());
}

// -----------------------------------------------------------------------------
// Handlers

#[derive(Mapped, Debug, PartialEq)]
#[serial(class = "test::Event")]
struct Event {
    #[serial(type = "NaiveDate<'%d/%m/%Y'>")]
    day: NaiveDate,
    at: DateTime<Utc>,
}

#[test]
fn date_formats_come_from_type_parameters() {
    let serializer = serializer();
    let event = Event {
        day: NaiveDate::from_ymd_opt(1815, 12, 10).unwrap(),
        at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
    };

    let text = serializer.to_string(&event, Format::Json, &Context::new()).unwrap();
    assert_eq!(text, r#"{"day":"10/12/1815","at":"2024-03-01T12:30:00+00:00"}"#);

    let back: Event = serializer.deserialize(text.as_bytes(), Format::Json, &Context::new()).unwrap();
    assert_eq!(back, event);
}

#[test]
fn date_handler_failures_carry_the_path() {
    let serializer = serializer();
    let input = br#"{"day":"1815-12-10","at":"2024-03-01T12:30:00+00:00"}"#;
    let err = serializer.deserialize::<Event>(input, Format::Json, &Context::new()).unwrap_err();

    assert!(matches!(err, Error::Handler { .. }));
    assert_eq!(err.path(), Some("$.day"));
}

#[derive(Debug, PartialEq, Clone, serde::Serialize, serde::Deserialize)]
struct Money {
    cents: i64,
    currency: String,
}

crate::impl_opaque_data!(Money => "Money");

#[derive(Mapped, Debug, PartialEq)]
#[serial(class = "test::Invoice")]
struct Invoice {
    number: u32,
    total: Money,
}

fn invoice() -> Invoice {
    Invoice {
        number: 12,
        total: Money {
            cents: 1250,
            currency: "EUR".into(),
        },
    }
}

#[test]
fn opaque_values_need_a_handler() {
    let serializer = serializer();
    let err = serializer.serialize(&invoice(), Format::Json, &Context::new()).unwrap_err();

    match err {
        Error::HandlerNotFound { type_name, direction, path } => {
            assert_eq!(type_name, "Money");
            assert_eq!(direction, Direction::Serialize);
            assert_eq!(path, "$.total");
        }
        other => panic!("unexpected error {other:?}"),
    }

    let input = br#"{"number":12,"total":"12.50 EUR"}"#;
    let err = serializer.deserialize::<Invoice>(input, Format::Json, &Context::new()).unwrap_err();
    assert!(matches!(err, Error::HandlerNotFound { direction: Direction::Deserialize, .. }));
}

#[test]
fn custom_handlers_take_over_their_tag() {
    let serializer = Serializer::builder()
        .configure_handlers(|registry| {
            registry.register_serialize("Money", |visitor, data, ctx| {
                let money = data
                    .downcast_ref::<Money>()
                    .ok_or_else(|| ctx.error("expected money"))?;
                visitor.visit_str(&format!("{}.{:02} {}", money.cents / 100, money.cents % 100, money.currency))
            });
            registry.register_deserialize("Money", |node: &dyn InputNode, ctx| {
                let Some(Scalar::Str(text) | Scalar::Text(text)) = node.scalar() else {
                    return Err(ctx.error("expected a string"));
                };
                let (amount, currency) = text.split_once(' ').ok_or_else(|| ctx.error("no currency"))?;
                let (units, cents) = amount.split_once('.').ok_or_else(|| ctx.error("no cents"))?;
                let cents = units.parse::<i64>().ok().zip(cents.parse::<i64>().ok());
                let (units, cents) = cents.ok_or_else(|| ctx.error("bad amount"))?;
                Ok(Value::Opaque(OpaqueValue::new(Money {
                    cents: units * 100 + cents,
                    currency: currency.to_owned(),
                })))
            });
        })
        .build()
        .unwrap();

    let text = serializer.to_string(&invoice(), Format::Json, &Context::new()).unwrap();
    assert_eq!(text, r#"{"number":12,"total":"12.50 EUR"}"#);

    let back: Invoice = serializer.deserialize(text.as_bytes(), Format::Json, &Context::new()).unwrap();
    assert_eq!(back, invoice());
}

#[test]
fn serde_handlers_bridge_existing_types() {
    let serializer = Serializer::builder()
        .configure_handlers(|registry| {
            registry.register_serde::<Money>("Money");
        })
        .build()
        .unwrap();

    let value = to_json(&serializer, &invoice(), &Context::new());
    assert_eq!(value, json!({ "number": 12, "total": { "cents": 1250, "currency": "EUR" } }));

    let bytes = serde_json::to_vec(&value).unwrap();
    let back: Invoice = serializer.deserialize(&bytes, Format::Json, &Context::new()).unwrap();
    assert_eq!(back, invoice());
}

// -----------------------------------------------------------------------------
// Metadata sources

const ADDRESS_MAPPING: &str = r#"
class = "test::Address"

[[properties]]
name = "street"
type = "string"
serialized_name = "road"

[[properties]]
name = "zip_code"
type = "string"
groups = ["postal"]
"#;

#[test]
fn mapping_files_override_declarations() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Address.toml"), ADDRESS_MAPPING).unwrap();

    let serializer = Serializer::builder()
        .metadata_dir("test", dir.path())
        .build()
        .unwrap();
    let address = Address {
        street: "Main".into(),
        zip_code: "1".into(),
    };

    let value = to_json(&serializer, &address, &Context::new());
    assert_eq!(value, json!({ "road": "Main", "zip_code": "1" }));

    let value = to_json(&serializer, &address, &Context::new().with_groups(["postal"]));
    assert_eq!(value, json!({ "zip_code": "1" }));

    let back: Address = serializer
        .deserialize(br#"{"road":"Main","zip_code":"1"}"#, Format::Json, &Context::new())
        .unwrap();
    assert_eq!(back, address);
}

#[test]
fn metadata_is_resolved_once_per_class() {
    let serializer = Serializer::builder()
        .naming_strategy(IdenticalNaming)
        .build()
        .unwrap();

    for _ in 0..3 {
        let value = to_json(&serializer, &ada(), &Context::new());
        assert_eq!(value["birthDate"], json!("1815-12-10"));
    }
    assert_eq!(serializer.metadata_factory().resolution_count(), 2);
}

#[derive(Mapped)]
#[serial(class = "test::Evolving")]
struct EvolvingV1 {
    id: u64,
}

#[derive(Mapped)]
#[serial(class = "test::Evolving")]
struct EvolvingV2 {
    id: u64,
    name: String,
}

#[test]
fn file_cache_follows_changed_derives() {
    let dir = tempfile::tempdir().unwrap();
    let build = || {
        Serializer::builder()
            .cache(Arc::new(FileCache::new(dir.path())))
            .build()
            .unwrap()
    };

    let first = build();
    let text = first.to_string(&EvolvingV1 { id: 1 }, Format::Json, &Context::new()).unwrap();
    assert_eq!(text, r#"{"id":1}"#);
    assert_eq!(first.metadata_factory().resolution_count(), 1);

    let unchanged = build();
    unchanged.to_string(&EvolvingV1 { id: 1 }, Format::Json, &Context::new()).unwrap();
    assert_eq!(unchanged.metadata_factory().resolution_count(), 0);

    let changed = build();
    let v2 = EvolvingV2 {
        id: 1,
        name: "a".into(),
    };
    let text = changed.to_string(&v2, Format::Json, &Context::new()).unwrap();
    assert_eq!(text, r#"{"id":1,"name":"a"}"#);
    assert_eq!(changed.metadata_factory().resolution_count(), 1);
}

#[test]
fn builder_from_config() {
    let config = SerializerConfig::from_toml_str(
        r#"
        naming_strategy = "camel_case"

        [property_naming]
        separator = "-"
        lowercase = true

        [metadata]
        drivers = ["attribute"]
        cache = { backend = "memory" }

        [handlers.datetime]
        default_timezone = "+02:00"
        "#,
    )
    .unwrap();
    let serializer = SerializerBuilder::from_config(&config).unwrap().build().unwrap();

    let value = to_json(&serializer, &ada(), &Context::new());
    assert_eq!(value["birth-date"], json!("1815-12-10"));
    assert_eq!(value["address"]["zip-code"], json!("SW1"));
}

#[test]
fn an_empty_driver_chain_is_rejected() {
    let err = Serializer::builder().driver_order([]).build().unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn serializer_is_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Serializer>();

    let serializer = Arc::new(serializer());
    let handles: Vec<_> = (0..4)
        .map(|id| {
            let serializer = serializer.clone();
            std::thread::spawn(move || {
                let user = User { id, ..ada() };
                let bytes = serializer.serialize(&user, Format::Json, &Context::new()).unwrap();
                serializer.deserialize::<User>(&bytes, Format::Json, &Context::new()).unwrap()
            })
        })
        .collect();

    for (id, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap().id, id as u64);
    }
}
