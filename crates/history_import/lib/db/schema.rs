// Subset of the OTRS schema read by the importer. Generated with Diesel CLI against an OTRS 5
// database, trimmed to the columns we select.

diesel::table! {
    article (id) {
        id -> Bigint,
        ticket_id -> Bigint,
        article_type_id -> Smallint,
    }
}

diesel::table! {
    article_type (id) {
        id -> Smallint,
        name -> Varchar,
    }
}

diesel::table! {
    ticket (id) {
        id -> Bigint,
        tn -> Varchar,
        title -> Nullable<Varchar>,
        create_time -> Datetime,
        change_time -> Datetime,
    }
}

diesel::table! {
    ticket_history (id) {
        id -> Bigint,
        name -> Varchar,
        history_type_id -> Smallint,
        ticket_id -> Bigint,
        article_id -> Nullable<Bigint>,
        create_time -> Datetime,
        change_time -> Datetime,
        change_by -> Integer,
    }
}

diesel::table! {
    ticket_history_type (id) {
        id -> Smallint,
        name -> Varchar,
    }
}

diesel::joinable!(article -> article_type (article_type_id));
diesel::joinable!(ticket_history -> ticket (ticket_id));
diesel::joinable!(ticket_history -> ticket_history_type (history_type_id));

diesel::allow_tables_to_appear_in_same_query!(
    article,
    article_type,
    ticket,
    ticket_history,
    ticket_history_type,
);
