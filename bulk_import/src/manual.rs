/*!

This is the long-form manual for `bulk_import` and `elecadmin`.

## Input formats

Two formats are accepted, chosen by the extension of the file name:
* `.csv` Comma separated values, UTF-8, with a header line
* `.xlsx` Excel workbooks: the first worksheet, or the one given with `--excel-worksheet-name`

In both cases the first line is the header and holds the column names. Rows are
numbered as in a spreadsheet: the header is row 1 and the first data row is
row 2. Errors about the file as a whole are reported on row 0.

Column order does not matter, and columns that are not listed below are ignored.

## Import kinds

| kind                  | required columns                                                                  | identified by                          |
|-----------------------|-----------------------------------------------------------------------------------|----------------------------------------|
| `division`            | name, code                                                                        | code                                   |
| `district`            | name, code, division_name                                                         | division, code                         |
| `constituency`        | name, number, district_name, division_name                                        | district, number                       |
| `party`               | name                                                                              | name                                   |
| `candidate`           | full_name, party_name, constituency_number, election_year, election_type           | full name, constituency, election year |
| `polling_center`      | code, name, constituency_number                                                   | code                                   |
| `polling_result`      | polling_center_code, candidate_name, constituency_number, election_year, votes_received | polling center, candidate, year  |
| `voter_demographics`  | constituency_number, election_year, total_voters                                  | constituency, year                     |
| `constituency_result` | constituency_number, election_year, total_votes, valid_votes, rejected_votes, turnout_percentage | constituency, year, election type |

A row whose identifying columns match an existing record updates that record.
Otherwise a new record is created. Importing the same file twice is harmless:
the second import only updates.

Records of other kinds are referenced by name (divisions, districts, parties),
by code (polling centers) or by number (constituencies). Referenced records must
exist before the import, or be created by an earlier import. Constituencies are
looked up by number alone: if the same number exists in several districts, the
oldest one is used.

Use `elecadmin template --kind <kind>` to get a file with all the accepted
columns and a few sample rows.

## Optional columns

The three states of an optional cell are handled differently:
* a filled cell sets the value
* an empty cell clears the value (or resets it to its default)
* a column that is not in the file leaves the stored value alone

Defaults: `is_active`, `is_registered` and `is_valid` are true, `is_official`
is false, demographic counts are 0 and the election type of a constituency
result is `National`.

Yes/no columns accept `true`, `false`, `1`, `0`, `yes` and `no`. Counts may be
written as `12` or `12.0`.

## Checks

Before anything is written, the whole file is checked:
* all the required columns are present (otherwise nothing else is checked)
* required cells are filled
* numbers are numbers and are in range: election years between 1970 and 2100,
  ages between 21 and 150, coordinates within -90..90 and -180..180, turnout
  between 0 and 100, counts non-negative
* in results, valid and rejected votes add up to the total
* a division code does not appear twice in the file

If any of these fail, nothing is imported and all the problems are reported.

Rows are then imported one at a time. A row that refers to a missing record, or
whose values contradict each other once merged with the stored record (more men,
women and others than voters), is skipped and reported. The other rows are
imported.

## Dry runs

With `--dry-run`, only the checks above are performed. The report counts the
rows and shows the first 10 of them. Nothing is written, and nothing is recorded
in the import history.

## Import history

Every import that is not a dry run leaves an entry in the import history of the
store, with the counts, the errors and the operator, including the imports that
were rejected or whose file could not be read.

## Job files

Several files can be imported in one go with a job file:

```json
{
  "storePath": "store.json",
  "operatorId": 1,
  "sources": [
    { "kind": "division", "filePath": "divisions.csv" },
    { "kind": "district", "filePath": "geography.xlsx", "excelWorksheetName": "Districts" },
    { "kind": "party", "filePath": "parties.csv", "dryRun": true }
  ]
}
```

Paths are relative to the job file. The sources are imported in order, and an
import that fails does not stop the next ones.

*/
