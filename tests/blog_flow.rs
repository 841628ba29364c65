mod common;

use blog_backend::helper::account_helpers::{self, AccountHelperError};
use blog_backend::helper::blog_helpers::{self, BlogHelperError};
use blog_backend::helper::form_helpers::{self, CleanRegistration, FormErrors, PostFormInput};
use blog_backend::models::db_operations::comments_db_operations;
use blog_backend::models::MutationOutcome;
use chrono::{Duration, Utc};
use common::*;

#[test]
fn hidden_posts_stay_off_public_listings() {
    let pool = memory_pool();
    let ann = add_user(&pool, "ann");
    let hidden_category = add_category(&pool, "drafts", false);

    add_post(&pool, &ann, &draft("Visible", an_hour_ago(), true));
    add_post(&pool, &ann, &draft("Unpublished", an_hour_ago(), false));
    add_post(&pool, &ann, &draft("Scheduled", tomorrow(), true));
    let mut in_hidden_category = draft("In hidden category", an_hour_ago(), true);
    in_hidden_category.category_id = Some(hidden_category);
    add_post(&pool, &ann, &in_hidden_category);

    let now = Utc::now();
    let index = blog_helpers::index_page(&pool, 1, 10, &now).unwrap();
    let titles: Vec<_> = index.items.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Visible"]);
    assert_eq!(index.total_count, 1);

    let (_, as_stranger) = blog_helpers::profile_page(&pool, "ann", None, 1, 10, &now).unwrap();
    assert_eq!(as_stranger.total_count, 1);

    let (profile, as_owner) = blog_helpers::profile_page(&pool, "ann", Some(&ann), 1, 10, &now).unwrap();
    assert_eq!(profile.username, "ann");
    assert_eq!(as_owner.total_count, 4);

    assert!(matches!(
        blog_helpers::category_page(&pool, "drafts", 1, 10, &now),
        Err(BlogHelperError::NotFound)
    ));
}

#[test]
fn category_page_lists_only_its_public_posts() {
    let pool = memory_pool();
    let ann = add_user(&pool, "ann");
    let travel = add_category(&pool, "travel", true);

    let mut trip = draft("Trip", an_hour_ago(), true);
    trip.category_id = Some(travel);
    add_post(&pool, &ann, &trip);
    let mut secret_trip = draft("Secret trip", an_hour_ago(), false);
    secret_trip.category_id = Some(travel);
    add_post(&pool, &ann, &secret_trip);
    add_post(&pool, &ann, &draft("Elsewhere", an_hour_ago(), true));

    let (category, page) = blog_helpers::category_page(&pool, "travel", 1, 10, &Utc::now()).unwrap();
    assert_eq!(category.slug, "travel");
    let titles: Vec<_> = page.items.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Trip"]);
}

#[test]
fn listings_are_newest_first_and_clamp_out_of_range_pages() {
    let pool = memory_pool();
    let ann = add_user(&pool, "ann");
    let base = Utc::now() - Duration::days(1);
    for i in 0..12 {
        add_post(&pool, &ann, &draft(&format!("Post {}", i), base + Duration::minutes(i), true));
    }

    let now = Utc::now();
    let first = blog_helpers::index_page(&pool, 1, 10, &now).unwrap();
    assert_eq!(first.items.len(), 10);
    assert_eq!(first.items[0].title, "Post 11");
    assert_eq!(first.num_pages, 2);
    assert!(first.has_next);
    assert!(!first.has_previous);

    let past_the_end = blog_helpers::index_page(&pool, 99, 10, &now).unwrap();
    assert_eq!(past_the_end.number, 2);
    assert_eq!(past_the_end.items.len(), 2);
    assert_eq!(past_the_end.items[1].title, "Post 0");

    let zero = blog_helpers::index_page(&pool, 0, 10, &now).unwrap();
    assert_eq!(zero.number, 1);
}

#[test]
fn creating_a_post_dated_now_publishes_it() {
    let pool = memory_pool();
    let ann = add_user(&pool, "ann");
    let now = Utc::now();

    let id = blog_helpers::create_post(&pool, &ann, draft("Now", an_hour_ago(), false), &now).unwrap();
    assert!(blog_helpers::read_post(&pool, id).unwrap().is_published);

    let id = blog_helpers::create_post(&pool, &ann, draft("Later", tomorrow(), false), &now).unwrap();
    let scheduled = blog_helpers::read_post(&pool, id).unwrap();
    assert!(!scheduled.is_published);
    assert_eq!(scheduled.author_id, ann.id);
}

#[test]
fn only_the_author_can_edit_or_delete_a_post() {
    let pool = memory_pool();
    let ann = add_user(&pool, "ann");
    let bob = add_user(&pool, "bob");
    let post_id = add_post(&pool, &ann, &draft("Original", an_hour_ago(), true));

    let outcome = blog_helpers::update_post_as(&pool, &bob, post_id, &draft("Hijacked", an_hour_ago(), true)).unwrap();
    assert_eq!(outcome, MutationOutcome::Forbidden);
    assert_eq!(blog_helpers::read_post(&pool, post_id).unwrap().title, "Original");

    assert_eq!(blog_helpers::delete_post_as(&pool, &bob, post_id).unwrap(), MutationOutcome::Forbidden);
    assert!(blog_helpers::read_post(&pool, post_id).is_ok());

    let outcome = blog_helpers::update_post_as(&pool, &ann, post_id, &draft("Edited", an_hour_ago(), false)).unwrap();
    assert_eq!(outcome, MutationOutcome::Applied);
    let edited = blog_helpers::read_post(&pool, post_id).unwrap();
    assert_eq!(edited.title, "Edited");
    assert!(!edited.is_published);
    assert_eq!(edited.author_id, ann.id);

    assert_eq!(blog_helpers::delete_post_as(&pool, &ann, post_id).unwrap(), MutationOutcome::Applied);
    assert!(matches!(blog_helpers::read_post(&pool, post_id), Err(BlogHelperError::NotFound)));
}

#[test]
fn hidden_post_detail_is_only_for_its_author() {
    let pool = memory_pool();
    let ann = add_user(&pool, "ann");
    let bob = add_user(&pool, "bob");
    let post_id = add_post(&pool, &ann, &draft("Draft", an_hour_ago(), false));
    let now = Utc::now();

    assert!(blog_helpers::post_detail(&pool, post_id, Some(&ann), &now).is_ok());
    assert!(matches!(
        blog_helpers::post_detail(&pool, post_id, Some(&bob), &now),
        Err(BlogHelperError::NotFound)
    ));
    assert!(matches!(
        blog_helpers::post_detail(&pool, post_id, None, &now),
        Err(BlogHelperError::NotFound)
    ));
    assert!(matches!(
        blog_helpers::add_comment(&pool, &bob, post_id, "hi", &now),
        Err(BlogHelperError::NotFound)
    ));
}

#[test]
fn comments_belong_to_their_author() {
    let pool = memory_pool();
    let ann = add_user(&pool, "ann");
    let bob = add_user(&pool, "bob");
    let post_id = add_post(&pool, &ann, &draft("Open", an_hour_ago(), true));
    let now = Utc::now();

    let comment_id = blog_helpers::add_comment(&pool, &bob, post_id, "First!", &now).unwrap();

    assert_eq!(
        blog_helpers::update_comment_as(&pool, &ann, post_id, comment_id, "Edited by ann").unwrap(),
        MutationOutcome::Forbidden
    );
    assert_eq!(
        blog_helpers::delete_comment_as(&pool, &ann, post_id, comment_id).unwrap(),
        MutationOutcome::Forbidden
    );
    assert_eq!(blog_helpers::read_comment(&pool, post_id, comment_id).unwrap().text, "First!");

    assert_eq!(
        blog_helpers::update_comment_as(&pool, &bob, post_id, comment_id, "Second thoughts").unwrap(),
        MutationOutcome::Applied
    );
    let detail = blog_helpers::post_detail(&pool, post_id, None, &now).unwrap();
    assert_eq!(detail.post.comment_count, 1);
    assert_eq!(detail.comments[0].text, "Second thoughts");
    assert_eq!(detail.comments[0].author.username, "bob");

    assert_eq!(
        blog_helpers::delete_comment_as(&pool, &bob, post_id, comment_id).unwrap(),
        MutationOutcome::Applied
    );
    assert!(matches!(
        blog_helpers::read_comment(&pool, post_id, comment_id),
        Err(BlogHelperError::NotFound)
    ));
}

#[test]
fn comment_under_the_wrong_post_is_not_found() {
    let pool = memory_pool();
    let ann = add_user(&pool, "ann");
    let first = add_post(&pool, &ann, &draft("First", an_hour_ago(), true));
    let second = add_post(&pool, &ann, &draft("Second", an_hour_ago(), true));
    let comment_id = blog_helpers::add_comment(&pool, &ann, first, "On first", &Utc::now()).unwrap();

    assert!(matches!(
        blog_helpers::delete_comment_as(&pool, &ann, second, comment_id),
        Err(BlogHelperError::NotFound)
    ));
    assert!(blog_helpers::read_comment(&pool, first, comment_id).is_ok());
}

#[test]
fn deleting_a_post_removes_its_comments() {
    let pool = memory_pool();
    let ann = add_user(&pool, "ann");
    let post_id = add_post(&pool, &ann, &draft("Doomed", an_hour_ago(), true));
    blog_helpers::add_comment(&pool, &ann, post_id, "bye", &Utc::now()).unwrap();

    assert_eq!(blog_helpers::delete_post_as(&pool, &ann, post_id).unwrap(), MutationOutcome::Applied);
    let conn = pool.get().unwrap();
    assert!(comments_db_operations::read_comments_for_post(&conn, post_id).unwrap().is_empty());
}

#[test]
fn post_form_only_accepts_offered_choices() {
    let pool = memory_pool();
    let travel = add_category(&pool, "travel", false);
    let choices = blog_helpers::post_form_choices(&pool).unwrap();
    assert_eq!(choices.category_ids(), vec![travel]);

    let mut input = PostFormInput::blank(&Utc::now());
    input.title = "Title".into();
    input.text = "Text".into();
    input.category = Some(travel.to_string());
    let draft = form_helpers::clean_post_form(&input, &choices.category_ids(), &choices.location_ids()).unwrap();
    assert_eq!(draft.category_id, Some(travel));

    input.category = Some((travel + 100).to_string());
    let errors = form_helpers::clean_post_form(&input, &choices.category_ids(), &choices.location_ids()).unwrap_err();
    let mut expected = FormErrors::default();
    expected.add("category", "Select a valid choice. That choice is not one of the available choices.");
    assert_eq!(errors, expected);
}

#[test]
fn registration_and_sign_in() {
    let pool = memory_pool();
    let form = CleanRegistration {
        username: "carol".into(),
        email: "carol@example.com".into(),
        password: "correct horse".into(),
    };
    let id = account_helpers::register_user(&pool, &form).unwrap();

    match account_helpers::register_user(&pool, &form) {
        Err(AccountHelperError::Invalid(errors)) => {
            let mut expected = FormErrors::default();
            expected.add("username", "A user with that username already exists.");
            assert_eq!(errors, expected);
        }
        other => panic!("expected a username error, got {:?}", other.map(|_| ())),
    }

    let user = account_helpers::authenticate(&pool, "carol", "correct horse").unwrap();
    assert_eq!(user.id, id);
    assert!(account_helpers::authenticate(&pool, "carol", "wrong").is_none());
    assert!(account_helpers::authenticate(&pool, "nobody", "correct horse").is_none());
}
