//! Entity graphs shared by the unit tests

use relschema_core::{Column, Entity, Module, Registry, RelationshipProperty, SqlType, TypeClass};
use serde_json::json;

fn pk(name: &str) -> Column {
    Column::new(name, SqlType::integer()).primary_key()
}

/// `Group` one-to-many `User`, declared from the many side with a backref
pub(crate) fn group_user() -> Registry {
    Registry::builder()
        .entity(
            Entity::new("Group")
                .doc("model for test")
                .column(pk("pk").doc("primary key"))
                .column(Column::new("name", SqlType::string(255)).not_null().with_default())
                .column(Column::new(
                    "color",
                    SqlType::enumeration(["red", "green", "yellow", "blue"]),
                ))
                .column(Column::new("created_at", SqlType::datetime())),
        )
        .entity(
            Entity::new("User")
                .column(pk("pk").doc("primary key"))
                .column(Column::new("name", SqlType::string(255)).not_null())
                .column(
                    Column::new("group_id", SqlType::integer())
                        .foreign_key("Group", "pk")
                        .not_null(),
                )
                .column(Column::new("created_at", SqlType::datetime()))
                .relationship(RelationshipProperty::many_to_one("group", "Group").backref("users")),
        )
        .build()
        .unwrap()
}

/// `A0 <- A1 <- ... <- A5`, each level reachable from its parent as `children`
pub(crate) fn chain() -> Registry {
    let mut builder = Registry::builder().entity(
        Entity::new("A0")
            .column(pk("pk").doc("primary key"))
            .column(Column::new("name", SqlType::string(255))),
    );
    for level in 1..=5 {
        let parent = format!("A{}", level - 1);
        builder = builder.entity(
            Entity::new(format!("A{level}"))
                .column(pk("pk").doc(format!("primary key{level}")))
                .column(Column::new("name", SqlType::string(255)))
                .column(
                    Column::new("parent_id", SqlType::integer())
                        .foreign_key(parent.clone(), "pk")
                        .not_null(),
                )
                .relationship(
                    RelationshipProperty::many_to_one("parent", parent).backref("children"),
                ),
        );
    }
    builder.build().unwrap()
}

/// `X -> Y -> Z -> Y` over three distinct many-to-one edges
pub(crate) fn cycle() -> Registry {
    Registry::builder()
        .entity(
            Entity::new("X")
                .column(pk("id").doc("primary key"))
                .column(Column::new("y_id", SqlType::integer()).foreign_key("Y", "id"))
                .relationship(RelationshipProperty::many_to_one("ys", "Y")),
        )
        .entity(
            Entity::new("Y")
                .column(pk("id").doc("primary key"))
                .column(Column::new("z_id", SqlType::integer()).foreign_key("Z", "id"))
                .relationship(RelationshipProperty::many_to_one("zs", "Z")),
        )
        .entity(
            Entity::new("Z")
                .column(pk("id").doc("primary key"))
                .column(Column::new("y_id", SqlType::integer()).foreign_key("Y", "id"))
                .relationship(RelationshipProperty::many_to_one("ys", "Y")),
        )
        .build()
        .unwrap()
}

pub(crate) fn renamed_column() -> Registry {
    Registry::builder()
        .entity(
            Entity::new("Account")
                .column(pk("id"))
                .column_as("display", Column::new("name", SqlType::string(64))),
        )
        .build()
        .unwrap()
}

pub(crate) fn tagged() -> Registry {
    Registry::builder()
        .entity(
            Entity::new("Post")
                .column(pk("id"))
                .relationship(RelationshipProperty::many_to_many("tags", "Tag")),
        )
        .entity(Entity::new("Tag").column(pk("id")))
        .build()
        .unwrap()
}

/// `Company` one-to-many `Team`; each team also has an owner and tagged members
pub(crate) fn company() -> Registry {
    Registry::builder()
        .entity(Entity::new("Company").column(pk("id")))
        .entity(Entity::new("Person").column(pk("id")))
        .entity(
            Entity::new("Team")
                .column(pk("id"))
                .column(
                    Column::new("company_id", SqlType::integer())
                        .foreign_key("Company", "id")
                        .not_null(),
                )
                .column(Column::new("owner_id", SqlType::integer()).foreign_key("Person", "id"))
                .relationship(
                    RelationshipProperty::many_to_one("company", "Company").backref("teams"),
                )
                .relationship(RelationshipProperty::many_to_one("owner", "Person"))
                .relationship(RelationshipProperty::many_to_many("tags", "Person")),
        )
        .build()
        .unwrap()
}

pub(crate) fn with_synonym() -> Registry {
    Registry::builder()
        .entity(Entity::new("Node").column(pk("id")).other("label", "synonym"))
        .build()
        .unwrap()
}

pub(crate) fn defaults() -> Registry {
    Registry::builder()
        .entity(
            Entity::new("Setting")
                .column(pk("id"))
                .column(Column::new("value", SqlType::text()).not_null().with_default())
                .column(Column::new("note", SqlType::text()).server_default()),
        )
        .build()
        .unwrap()
}

pub(crate) fn raw_type() -> Registry {
    Registry::builder()
        .entity(
            Entity::new("Shape")
                .column(pk("id"))
                .column(Column::raw("geom", TypeClass::new("Geometry"))),
        )
        .build()
        .unwrap()
}

pub(crate) fn custom_types() -> Registry {
    Registry::builder()
        .entity(
            Entity::new("Item")
                .column(pk("id"))
                .column(Column::new("scores", SqlType::array(SqlType::integer())))
                .column(Column::new(
                    "choice",
                    SqlType::decorator(TypeClass::new("Choice"), SqlType::string(1)),
                ))
                .column(Column::new("color", SqlType::enumeration(["red", "green"])))
                .column(Column::new("token", SqlType::uuid())),
        )
        .build()
        .unwrap()
}

/// Every scalar format the mapper converts
pub(crate) fn formats() -> Registry {
    Registry::builder()
        .entity(
            Entity::new("Event")
                .column(pk("id"))
                .column(Column::new("title", SqlType::string(64)).not_null())
                .column(Column::new("ratio", SqlType::float()))
                .column(Column::new("active", SqlType::boolean()))
                .column(Column::new("starts_at", SqlType::datetime()))
                .column(Column::new("day", SqlType::date()))
                .column(Column::new("alarm", SqlType::time()))
                .column(Column::new("token", SqlType::uuid()))
                .column(Column::new("extra", SqlType::json()))
                .column(Column::new("scores", SqlType::array(SqlType::integer()))),
        )
        .build()
        .unwrap()
}

pub(crate) fn module() -> Module {
    Module::new("models")
        .entity("Group")
        .entity("User")
        .value("VERSION", json!("1.0"))
}
