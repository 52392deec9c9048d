//! GraphQL documents sent to the expense server. Every operation selects the same record fields.

pub(super) const CREATE_EXPENSE: &str = r#"
    mutation CreateExpense($user: String!, $amount: Int!, $date: Int, $description: String, $category: [String!]) {
        createExpense(input: {
            user: $user,
            amount: $amount,
            date: $date,
            description: $description,
            categories: $category
        }) {
            id
            user
            date
            amount
            description
            categories
        }
    }
"#;

pub(super) const UPDATE_EXPENSE: &str = r#"
    mutation UpdateExpense($id: ID!, $user: String!, $amount: Int!, $date: Int, $description: String, $category: [String!]) {
        updateExpense(id: $id, input: {
            user: $user,
            amount: $amount,
            date: $date,
            description: $description,
            categories: $category
        }) {
            id
            user
            date
            amount
            description
            categories
        }
    }
"#;

pub(super) const DELETE_EXPENSE: &str = r#"
    mutation DeleteExpense($id: ID!) {
        deleteExpense(id: $id) {
            id
            user
            date
            amount
            description
            categories
        }
    }
"#;

pub(super) const GET_EXPENSES_IN_RANGE: &str = r#"
    query GetExpensesInRange($since: Int!, $to: Int!) {
        getExpensesInRange(since: $since, to: $to) {
            id
            user
            date
            amount
            description
            categories
        }
    }
"#;
