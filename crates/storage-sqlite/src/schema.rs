diesel::table! {
    history (history_id) {
        history_id -> Integer,
        incid -> Text,
        toid -> Nullable<Text>,
        toid_fragment_id -> Nullable<Text>,
        modified_date -> Text,
        modified_user_id -> Text,
        modified_process -> Text,
        modified_reason -> Text,
        modified_operation -> Text,
        modified_incid -> Nullable<Text>,
        modified_toid_fragment_id -> Nullable<Text>,
        modified_length -> Nullable<Double>,
        modified_area -> Nullable<Double>,
        modified_ihs_category -> Nullable<Text>,
        modified_ihs_summary -> Nullable<Text>,
    }
}

diesel::table! {
    #[sql_name = "incid"]
    incid_header (incid) {
        incid -> Text,
        ihs_version -> Integer,
        ihs_habitat -> Nullable<Text>,
        ihs_category -> Nullable<Text>,
        ihs_summary -> Nullable<Text>,
        site_ref -> Nullable<Text>,
        site_name -> Nullable<Text>,
        boundary_base_map -> Nullable<Text>,
        digitisation_base_map -> Nullable<Text>,
        general_comments -> Nullable<Text>,
        created_date -> Text,
        created_user_id -> Text,
        last_modified_date -> Text,
        last_modified_user_id -> Text,
    }
}

diesel::table! {
    incid_bap (bap_id) {
        bap_id -> Integer,
        incid -> Text,
        bap_habitat -> Text,
        quality_determination -> Nullable<Text>,
        quality_interpretation -> Nullable<Text>,
        interpretation_comments -> Nullable<Text>,
    }
}

diesel::table! {
    incid_ihs_complex (complex_id) {
        complex_id -> Integer,
        incid -> Text,
        complex -> Text,
    }
}

diesel::table! {
    incid_ihs_formation (formation_id) {
        formation_id -> Integer,
        incid -> Text,
        formation -> Text,
    }
}

diesel::table! {
    incid_ihs_management (management_id) {
        management_id -> Integer,
        incid -> Text,
        management -> Text,
    }
}

diesel::table! {
    incid_ihs_matrix (matrix_id) {
        matrix_id -> Integer,
        incid -> Text,
        matrix -> Text,
    }
}

diesel::table! {
    incid_mm_polygons (toid, toid_fragment_id) {
        toid -> Text,
        toid_fragment_id -> Text,
        incid -> Text,
        ihs_category -> Nullable<Text>,
        ihs_summary -> Nullable<Text>,
        shape_length -> Nullable<Double>,
        shape_area -> Nullable<Double>,
    }
}

diesel::table! {
    incid_osmm_updates (incid_osmm_update_id) {
        incid_osmm_update_id -> Integer,
        incid -> Text,
        osmm_xref_id -> Nullable<Integer>,
        process_flag -> Nullable<Integer>,
        spatial_flag -> Nullable<Text>,
        change_flag -> Nullable<Text>,
        status -> Integer,
        last_modified_date -> Nullable<Text>,
        last_modified_user_id -> Nullable<Text>,
    }
}

diesel::table! {
    incid_sources (incid_source_id) {
        incid_source_id -> Integer,
        incid -> Text,
        source_id -> Nullable<Integer>,
        source_date_start -> Nullable<Text>,
        source_habitat_class -> Nullable<Text>,
        source_habitat_type -> Nullable<Text>,
        source_boundary_importance -> Nullable<Text>,
        source_habitat_importance -> Nullable<Text>,
        sort_order -> Nullable<Integer>,
    }
}

diesel::table! {
    lut_bap_habitat_ihs (code_ihs, bap_habitat) {
        code_ihs -> Text,
        bap_habitat -> Text,
    }
}

diesel::table! {
    lut_ihs_complex (code) {
        code -> Text,
        description -> Nullable<Text>,
    }
}

diesel::table! {
    lut_ihs_formation (code) {
        code -> Text,
        description -> Nullable<Text>,
    }
}

diesel::table! {
    lut_ihs_habitat (code) {
        code -> Text,
        description -> Nullable<Text>,
        category -> Text,
    }
}

diesel::table! {
    lut_ihs_habitat_ihs_complex (code_habitat, code_complex) {
        code_habitat -> Text,
        code_complex -> Text,
    }
}

diesel::table! {
    lut_ihs_habitat_ihs_formation (code_habitat, code_formation) {
        code_habitat -> Text,
        code_formation -> Text,
    }
}

diesel::table! {
    lut_ihs_habitat_ihs_management (code_habitat, code_management) {
        code_habitat -> Text,
        code_management -> Text,
    }
}

diesel::table! {
    lut_ihs_habitat_ihs_matrix (code_habitat, code_matrix) {
        code_habitat -> Text,
        code_matrix -> Text,
    }
}

diesel::table! {
    lut_ihs_management (code) {
        code -> Text,
        description -> Nullable<Text>,
    }
}

diesel::table! {
    lut_ihs_matrix (code) {
        code -> Text,
        description -> Nullable<Text>,
    }
}

diesel::table! {
    lut_last_incid (site_id) {
        site_id -> Text,
        last_incid -> Integer,
    }
}

diesel::table! {
    lut_operation (code) {
        code -> Text,
        description -> Text,
        sort_order -> Nullable<Integer>,
    }
}

diesel::table! {
    lut_sources (source_id) {
        source_id -> Integer,
        source_name -> Text,
    }
}

diesel::joinable!(incid_bap -> incid_header (incid));
diesel::joinable!(incid_ihs_complex -> incid_header (incid));
diesel::joinable!(incid_ihs_formation -> incid_header (incid));
diesel::joinable!(incid_ihs_management -> incid_header (incid));
diesel::joinable!(incid_ihs_matrix -> incid_header (incid));
diesel::joinable!(incid_mm_polygons -> incid_header (incid));
diesel::joinable!(incid_osmm_updates -> incid_header (incid));
diesel::joinable!(incid_sources -> incid_header (incid));

diesel::allow_tables_to_appear_in_same_query!(
    history,
    incid_header,
    incid_bap,
    incid_ihs_complex,
    incid_ihs_formation,
    incid_ihs_management,
    incid_ihs_matrix,
    incid_mm_polygons,
    incid_osmm_updates,
    incid_sources,
    lut_bap_habitat_ihs,
    lut_ihs_complex,
    lut_ihs_formation,
    lut_ihs_habitat,
    lut_ihs_habitat_ihs_complex,
    lut_ihs_habitat_ihs_formation,
    lut_ihs_habitat_ihs_management,
    lut_ihs_habitat_ihs_matrix,
    lut_ihs_management,
    lut_ihs_matrix,
    lut_last_incid,
    lut_operation,
    lut_sources,
);
