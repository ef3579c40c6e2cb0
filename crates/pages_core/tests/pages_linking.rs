use pages_core::db::open_db_in_memory;
use pages_core::{
    LinkOrderUpdate, PagesService, PagesServiceError, PrincipalKind, SqlitePagesRepository,
    SELF_LINK_ID,
};
use rusqlite::Connection;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn service(conn: &Connection) -> PagesService<SqlitePagesRepository<'_>> {
    PagesService::new(SqlitePagesRepository::try_new(conn).unwrap())
}

fn link_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM link;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn duplicate_name_is_rejected_within_kind_only() {
    let conn = setup();
    let service = service(&conn);

    let group = service.add_group("Home").unwrap().unwrap();
    assert_eq!(group.kind, PrincipalKind::Group);
    assert_eq!(group.name, "Home");
    assert_eq!(group.external_id, None);

    assert!(service.add_group("Home").unwrap().is_none());
    assert!(service.add_group("  Home ").unwrap().is_none());

    let page = service.add_page("Home").unwrap().unwrap();
    assert_eq!(page.kind, PrincipalKind::Page);
    assert_ne!(page.id, group.id);
}

#[test]
fn add_principal_rejects_blank_names_and_things() {
    let conn = setup();
    let service = service(&conn);

    assert!(matches!(
        service.add_page("   "),
        Err(PagesServiceError::InvalidName)
    ));
    assert!(matches!(
        service.add_principal(PrincipalKind::Thing, "Lamp"),
        Err(PagesServiceError::NotUserManaged(PrincipalKind::Thing))
    ));
}

#[test]
fn list_by_kind_returns_only_that_kind_in_creation_order() {
    let conn = setup();
    let service = service(&conn);

    let beta = service.add_group("Beta").unwrap().unwrap();
    let alpha = service.add_group("Alpha").unwrap().unwrap();
    service.add_page("Kitchen").unwrap().unwrap();
    service.upsert_thing("dev1", "Lamp").unwrap();

    let groups = service.list_groups().unwrap();
    let ids: Vec<_> = groups.iter().map(|group| group.id).collect();
    assert_eq!(ids, vec![beta.id, alpha.id]);

    let pages = service.list_pages().unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].name, "Kitchen");
}

#[test]
fn get_contents_returns_container_row_then_children() {
    let conn = setup();
    let service = service(&conn);

    let page = service.add_page("Kitchen").unwrap().unwrap();
    let lamp = service.upsert_thing("dev1", "Lamp").unwrap();
    let fan = service.upsert_thing("dev2", "Fan").unwrap();
    let lamp_link = service
        .insert_link(page.id, lamp.principal().id, None)
        .unwrap()
        .unwrap();
    let fan_link = service
        .insert_link(page.id, fan.principal().id, None)
        .unwrap()
        .unwrap();

    let contents = service.get_contents(page.id).unwrap();
    assert_eq!(contents.len(), 3);
    assert!(contents[0].is_container());
    assert_eq!(contents[0].principal, page);
    assert_eq!(contents[0].link_id, SELF_LINK_ID);
    assert_eq!(contents[1].principal.id, lamp.principal().id);
    assert_eq!(contents[1].link_id, lamp_link.id);
    assert_eq!(contents[2].principal.id, fan.principal().id);
    assert_eq!(contents[2].link_id, fan_link.id);
}

#[test]
fn get_contents_of_unknown_id_is_empty() {
    let conn = setup();
    let service = service(&conn);

    assert!(service.get_contents(4242).unwrap().is_empty());
}

#[test]
fn insert_link_rejects_duplicates_and_missing_endpoints() {
    let conn = setup();
    let service = service(&conn);

    let group = service.add_group("Home").unwrap().unwrap();
    let page = service.add_page("Kitchen").unwrap().unwrap();

    let link = service.insert_link(group.id, page.id, None).unwrap().unwrap();
    assert_eq!(link.container, group.id);
    assert_eq!(link.contained, page.id);
    assert_eq!(service.get_link(link.id).unwrap(), Some(link));

    assert!(service.insert_link(group.id, page.id, None).unwrap().is_none());
    assert!(service.insert_link(group.id, 9999, None).unwrap().is_none());
    assert!(service.insert_link(9999, page.id, None).unwrap().is_none());
    assert_eq!(link_count(&conn), 1);
}

#[test]
fn self_link_is_accepted_by_the_store() {
    let conn = setup();
    let service = service(&conn);

    let group = service.add_group("Loop").unwrap().unwrap();
    let link = service.insert_link(group.id, group.id, None).unwrap();
    assert!(link.is_some());

    let contents = service.get_contents(group.id).unwrap();
    assert_eq!(contents.len(), 2);
    assert!(contents[0].is_container());
    assert!(!contents[1].is_container());
    assert_eq!(contents[1].principal.id, group.id);
}

#[test]
fn deleting_principal_cascades_links_but_keeps_children() {
    let conn = setup();
    let service = service(&conn);

    let group = service.add_group("Home").unwrap().unwrap();
    let page = service.add_page("Kitchen").unwrap().unwrap();
    let lamp = service.upsert_thing("dev1", "Lamp").unwrap();
    service.insert_link(group.id, page.id, None).unwrap().unwrap();
    service
        .insert_link(page.id, lamp.principal().id, None)
        .unwrap()
        .unwrap();
    assert_eq!(link_count(&conn), 2);

    service.delete_principal(page.id).unwrap();

    assert_eq!(link_count(&conn), 0);
    assert!(service.get_principal(page.id).unwrap().is_none());
    assert!(service.get_principal(lamp.principal().id).unwrap().is_some());
    assert!(service.get_principal(group.id).unwrap().is_some());

    service.delete_principal(page.id).unwrap();
}

#[test]
fn delete_link_is_idempotent() {
    let conn = setup();
    let service = service(&conn);

    let group = service.add_group("Home").unwrap().unwrap();
    let lamp = service.upsert_thing("dev1", "Lamp").unwrap();
    let link = service
        .insert_link(group.id, lamp.principal().id, None)
        .unwrap()
        .unwrap();

    service.delete_link(link.id).unwrap();
    service.delete_link(link.id).unwrap();
    assert!(service.get_link(link.id).unwrap().is_none());
    assert_eq!(service.get_contents(group.id).unwrap().len(), 1);
}

#[test]
fn available_links_exclude_linked_and_sort_by_name() {
    let conn = setup();
    let service = service(&conn);

    let page = service.add_page("Kitchen").unwrap().unwrap();
    let other_page = service.add_page("Hall").unwrap().unwrap();
    let zeta = service.add_group("Zeta").unwrap().unwrap();
    let lamp = service.upsert_thing("dev1", "Lamp").unwrap();
    let fan = service.upsert_thing("dev2", "Fan").unwrap();
    let kettle = service.upsert_thing("dev3", "Kettle").unwrap();
    service
        .insert_link(page.id, kettle.principal().id, None)
        .unwrap()
        .unwrap();

    let for_page = service.list_available_for_page(page.id);
    let names: Vec<_> = for_page.iter().map(|item| item.name.as_str()).collect();
    assert_eq!(names, vec!["Fan", "Lamp", "Zeta"]);
    assert!(for_page.iter().all(|item| item.id != other_page.id));

    let for_group = service.list_available_for_group(zeta.id);
    let ids: Vec<_> = for_group.iter().map(|item| item.id).collect();
    assert_eq!(
        ids,
        vec![fan.principal().id, kettle.principal().id, lamp.principal().id]
    );

    assert!(service.get_available_links(page.id, &[]).is_empty());
}

#[test]
fn available_links_degrade_to_empty_on_storage_failure() {
    let conn = setup();
    let service = service(&conn);

    let page = service.add_page("Kitchen").unwrap().unwrap();
    service.upsert_thing("dev1", "Lamp").unwrap();
    conn.execute_batch("DROP TABLE link;").unwrap();

    assert!(service.list_available_for_page(page.id).is_empty());
}

#[test]
fn link_order_defaults_to_append_and_can_be_updated() {
    let conn = setup();
    let service = service(&conn);

    let page = service.add_page("Kitchen").unwrap().unwrap();
    let lamp = service.upsert_thing("dev1", "Lamp").unwrap();
    let fan = service.upsert_thing("dev2", "Fan").unwrap();
    let kettle = service.upsert_thing("dev3", "Kettle").unwrap();

    let lamp_link = service
        .insert_link(page.id, lamp.principal().id, None)
        .unwrap()
        .unwrap();
    let fan_link = service
        .insert_link(page.id, fan.principal().id, None)
        .unwrap()
        .unwrap();
    let kettle_link = service
        .insert_link(page.id, kettle.principal().id, Some(-5))
        .unwrap()
        .unwrap();
    assert_eq!(lamp_link.order, 0);
    assert_eq!(fan_link.order, 1);
    assert_eq!(kettle_link.order, -5);

    let order_of = |conn_service: &PagesService<SqlitePagesRepository<'_>>| {
        conn_service
            .get_contents(page.id)
            .unwrap()
            .into_iter()
            .skip(1)
            .map(|entry| entry.link_id)
            .collect::<Vec<_>>()
    };
    assert_eq!(
        order_of(&service),
        vec![kettle_link.id, lamp_link.id, fan_link.id]
    );

    let updated = service
        .update_link_order(&[
            LinkOrderUpdate {
                link_id: fan_link.id,
                order: 0,
            },
            LinkOrderUpdate {
                link_id: lamp_link.id,
                order: 1,
            },
            LinkOrderUpdate {
                link_id: kettle_link.id,
                order: 2,
            },
            LinkOrderUpdate {
                link_id: 9999,
                order: 3,
            },
        ])
        .unwrap();
    assert_eq!(updated, 3);
    assert_eq!(
        order_of(&service),
        vec![fan_link.id, lamp_link.id, kettle_link.id]
    );
    assert_eq!(service.update_link_order(&[]).unwrap(), 0);
}

#[test]
fn appending_after_maximum_order_saturates() {
    let conn = setup();
    let service = service(&conn);

    let page = service.add_page("Kitchen").unwrap().unwrap();
    let lamp = service.upsert_thing("dev1", "Lamp").unwrap();
    let fan = service.upsert_thing("dev2", "Fan").unwrap();

    let last = service
        .insert_link(page.id, lamp.principal().id, Some(i64::MAX))
        .unwrap()
        .unwrap();
    let appended = service
        .insert_link(page.id, fan.principal().id, None)
        .unwrap()
        .unwrap();
    assert_eq!(appended.order, i64::MAX);
    assert_eq!(link_count(&conn), 2);

    let link_ids: Vec<_> = service
        .get_contents(page.id)
        .unwrap()
        .into_iter()
        .skip(1)
        .map(|entry| entry.link_id)
        .collect();
    assert_eq!(link_ids, vec![last.id, appended.id]);
}

#[test]
fn home_kitchen_lamp_scenario() {
    let conn = setup();
    let service = service(&conn);

    let home = service.add_group("Home").unwrap().unwrap();
    let kitchen = service.add_page("Kitchen").unwrap().unwrap();
    let lamp = service.upsert_thing("dev1", "Lamp").unwrap().principal().clone();
    let home_kitchen = service
        .insert_link(home.id, kitchen.id, None)
        .unwrap()
        .unwrap();
    let kitchen_lamp = service
        .insert_link(kitchen.id, lamp.id, None)
        .unwrap()
        .unwrap();

    let home_contents = service.get_contents(home.id).unwrap();
    let rows: Vec<_> = home_contents
        .iter()
        .map(|entry| (entry.principal.name.as_str(), entry.link_id))
        .collect();
    assert_eq!(rows, vec![("Home", -1), ("Kitchen", home_kitchen.id)]);

    let kitchen_contents = service.get_contents(kitchen.id).unwrap();
    let rows: Vec<_> = kitchen_contents
        .iter()
        .map(|entry| (entry.principal.name.as_str(), entry.link_id))
        .collect();
    assert_eq!(rows, vec![("Kitchen", -1), ("Lamp", kitchen_lamp.id)]);

    service.delete_principal(kitchen.id).unwrap();

    let home_contents = service.get_contents(home.id).unwrap();
    assert_eq!(home_contents.len(), 1);
    assert!(home_contents[0].is_container());
    assert!(service.get_link(kitchen_lamp.id).unwrap().is_none());
    assert_eq!(service.get_principal(lamp.id).unwrap(), Some(lamp));
}
